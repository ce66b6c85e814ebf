use thiserror::Error;

/// Unified error type for the ingest core.
///
/// Variants map onto spec-level failure modes rather than HTTP status codes —
/// status mapping lives in `handler::status_for` so this type stays meaningful
/// outside an HTTP context (e.g. the CLI harness).
#[derive(Debug, Error)]
pub enum Error {
   #[error("invalid request body: {0}")]
   Body(String),

   #[error("failed to acquire segment lease for {segment_id}: {reason}")]
   SegmentLock { segment_id: String, reason: String },

   #[error("failed to release segment lease for {segment_id}: {reason}")]
   SegmentUnlock { segment_id: String, reason: String },

   #[error("segment write failed: {0}")]
   Write(String),

   #[error("invalid configuration: {0}")]
   Config(String),

   #[error(transparent)]
   Io(#[from] std::io::Error),

   #[error(transparent)]
   Json(#[from] serde_json::Error),

   #[error(transparent)]
   Sqlite(#[from] rusqlite::Error),

   #[error("object store request failed: {0}")]
   ObjectStore(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
