pub mod filesystem;
pub mod object_store;

use async_trait::async_trait;

use crate::error::Result;

/// A handle proving ownership of a segment's lease, returned by
/// [`LeaseManager::acquire`] and required by [`LeaseManager::release`].
/// Each backend stashes whatever it needs to prove it still owns the lease
/// at release time (a symlink target, an S3 ETag).
pub trait LeaseHandle: Send + Sync + std::fmt::Debug {}

/// Coordinates at-most-one-writer access to a segment across an
/// uncoordinated fleet of instances. Exactly one implementation is active
/// per process — selected once at construction, never switched per call.
#[async_trait]
pub trait LeaseManager: Send + Sync {
   type Handle: LeaseHandle;

   /// Prepares whatever directories/state a segment needs before its first
   /// lock attempt. Idempotent.
   async fn initialize(&self, dataset_id: &str, segment_id: &str) -> Result<()>;

   /// Blocks (without holding a thread) until the lease is acquired or the
   /// configured timeout elapses.
   async fn acquire(&self, dataset_id: &str, segment_id: &str) -> Result<Self::Handle>;

   /// Releases a previously acquired lease. Must be idempotent-safe to call
   /// even when the lease is no longer owned by this handle — callers
   /// report but do not propagate the resulting error (spec: a failed
   /// unlock never undoes an already-successful write).
   async fn release(&self, dataset_id: &str, segment_id: &str, handle: Self::Handle) -> Result<()>;
}
