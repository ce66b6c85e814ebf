pub mod columnfile;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Record;

/// Persists a parsed record to a segment's backing store. Exactly one
/// implementation is active per process, selected once at construction.
#[async_trait]
pub trait SegmentWriter: Send + Sync {
   async fn write(&self, dataset_id: &str, segment_id: &str, record: &Record) -> Result<()>;
}
