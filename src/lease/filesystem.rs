use std::io;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::util::fsync_dir;

use super::{LeaseHandle, LeaseManager};

const NS_PER_MIN: i64 = 60_000_000_000;

#[derive(Debug)]
pub struct FilesystemLeaseHandle {
   lockfile: PathBuf,
}

impl LeaseHandle for FilesystemLeaseHandle {}

/// Per-segment exclusive lease via atomic symlink creation on a shared
/// POSIX mount, gated by an LRU cache of already-initialized
/// `(dataset, instance, segment)` triples so a warm instance re-processing
/// many records against the same segment does no redundant I/O.
pub struct FilesystemLeaseManager {
   base: PathBuf,
   instance_id: String,
   clock: Arc<dyn Clock>,
   timeout_minutes: u64,
   delay_secs: u64,
   init_cache: Cache<String, ()>,
}

impl FilesystemLeaseManager {
   pub fn new(
      base: impl Into<PathBuf>,
      instance_id: impl Into<String>,
      clock: Arc<dyn Clock>,
      timeout_minutes: u64,
      delay_secs: u64,
   ) -> Self {
      let init_cache = Cache::builder()
         .max_capacity(50)
         .time_to_live(Duration::from_secs(15 * 60))
         .build();

      Self { base: base.into(), instance_id: instance_id.into(), clock, timeout_minutes, delay_secs, init_cache }
   }

   fn segment_dir(&self, dataset_id: &str, segment_id: &str) -> PathBuf {
      self.base.join(dataset_id).join(segment_id)
   }

   fn locks_dir(&self, dataset_id: &str, segment_id: &str) -> PathBuf {
      self.segment_dir(dataset_id, segment_id).join(".locks")
   }

   fn lock_path(&self, dataset_id: &str, segment_id: &str) -> PathBuf {
      self.locks_dir(dataset_id, segment_id).join(format!("{segment_id}.lck"))
   }

   fn sentinel_path(&self, dataset_id: &str, segment_id: &str) -> PathBuf {
      self.locks_dir(dataset_id, segment_id).join(format!("{}.lck", self.instance_id))
   }

   fn cache_key(&self, dataset_id: &str, segment_id: &str) -> String {
      format!("{dataset_id}\0{}\0{segment_id}", self.instance_id)
   }
}

#[async_trait]
impl LeaseManager for FilesystemLeaseManager {
   type Handle = FilesystemLeaseHandle;

   async fn initialize(&self, dataset_id: &str, segment_id: &str) -> Result<()> {
      let key = self.cache_key(dataset_id, segment_id);
      if self.init_cache.get(&key).await.is_some() {
         return Ok(());
      }

      let locks_dir = self.locks_dir(dataset_id, segment_id);
      std::fs::create_dir_all(&locks_dir)?;

      let sentinel = self.sentinel_path(dataset_id, segment_id);
      if !sentinel.exists() {
         std::fs::File::create(&sentinel)?;
         fsync_dir(&locks_dir)?;
      }

      self.init_cache.insert(key, ()).await;
      Ok(())
   }

   async fn acquire(&self, dataset_id: &str, segment_id: &str) -> Result<Self::Handle> {
      let lockfile = self.lock_path(dataset_id, segment_id);
      let sentinel = self.sentinel_path(dataset_id, segment_id);
      let start = self.clock.now_nanos();
      let deadline_ns = self.timeout_minutes as i64 * NS_PER_MIN;

      loop {
         match symlink(&sentinel, &lockfile) {
            Ok(()) => {
               debug!(segment_id, dataset_id, "filesystem lease acquired");
               return Ok(FilesystemLeaseHandle { lockfile: sentinel });
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
               if self.clock.now_nanos() - start >= deadline_ns {
                  return Err(Error::SegmentLock { segment_id: segment_id.to_string(), reason: "timed out".to_string() });
               }
               tokio::time::sleep(Duration::from_secs(self.delay_secs)).await;
            }
            Err(err) => {
               return Err(Error::SegmentLock { segment_id: segment_id.to_string(), reason: err.to_string() });
            }
         }
      }
   }

   async fn release(&self, dataset_id: &str, segment_id: &str, handle: Self::Handle) -> Result<()> {
      let expected = self.sentinel_path(dataset_id, segment_id);
      if handle.lockfile != expected {
         return Err(Error::SegmentUnlock {
            segment_id: segment_id.to_string(),
            reason: "releasing a lease this instance does not own".to_string(),
         });
      }

      let lockfile = self.lock_path(dataset_id, segment_id);
      let target = std::fs::read_link(&lockfile).map_err(|err| Error::SegmentUnlock {
         segment_id: segment_id.to_string(),
         reason: format!("could not read lock symlink: {err}"),
      })?;

      if target != expected {
         return Err(Error::SegmentUnlock {
            segment_id: segment_id.to_string(),
            reason: "lease ownership was lost before release".to_string(),
         });
      }

      std::fs::remove_file(&lockfile).map_err(|err| Error::SegmentUnlock {
         segment_id: segment_id.to_string(),
         reason: format!("could not remove lock symlink: {err}"),
      })?;

      debug!(segment_id, dataset_id, "filesystem lease released");
      Ok(())
   }
}
