use std::sync::OnceLock;

use figment::{Figment, providers::{Env, Serialized}};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which substrate provides mutual exclusion for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseBackend {
   Filesystem,
   ObjectStore,
}

/// Which substrate a segment's records are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterBackend {
   ColumnFiles,
   Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
   /// Mount point / prefix common to every instance in the fleet.
   pub shared_storage_basedir: String,

   /// Width, in minutes, of a segment's time bucket.
   pub segment_bucket_size_minutes: u32,

   /// Lease TTL in seconds, used as the object-store lease's `Expires` and
   /// as the staleness threshold for the filesystem lease's sentinel.
   pub segment_lock_ttl: u64,

   /// How long the filesystem lease manager retries `acquire` before giving
   /// up, in minutes (spec units: `timeout · 60·10⁹` nanoseconds).
   pub filesystem_lock_timeout_minutes: u64,

   /// Delay between successive filesystem acquisition attempts, in seconds.
   pub filesystem_lock_delay_secs: u64,

   /// How long the object-store lease manager retries `acquire` before
   /// giving up, in seconds.
   pub object_store_lock_timeout_secs: u64,

   /// Delay between successive object-store acquisition attempts, in
   /// seconds.
   pub object_store_lock_delay_secs: u64,

   pub lease_backend: LeaseBackend,
   pub writer_backend: WriterBackend,

   /// Bucket name used by the object-store lease manager and, when the
   /// writer backend is also object-store-backed, by segment data objects.
   pub segment_lock_bucket: Option<String>,

   /// Named AWS profile used to build the S3 client, mirroring the
   /// original lambda's lazy `boto3.Session(profile_name=...)`.
   pub profile_name: Option<String>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         shared_storage_basedir: "/mnt/otel-hot/segments".to_string(),
         segment_bucket_size_minutes: 15,
         segment_lock_ttl: 300,
         filesystem_lock_timeout_minutes: 10,
         filesystem_lock_delay_secs: 1,
         object_store_lock_timeout_secs: 300,
         object_store_lock_delay_secs: 1,
         lease_backend: LeaseBackend::Filesystem,
         writer_backend: WriterBackend::Sqlite,
         segment_lock_bucket: None,
         profile_name: None,
      }
   }
}

impl Config {
   /// Loads configuration from the process environment, layered over the
   /// spec-mandated defaults. Unlike the teacher crate's `GGREP_`-prefixed
   /// variables, these names are already globally namespaced and are read
   /// unprefixed.
   pub fn load() -> Result<Self> {
      let config: Config = Figment::from(Serialized::defaults(Config::default()))
         .merge(Env::raw().lowercase(true))
         .extract()
         .map_err(|err| Error::Config(err.to_string()))?;

      config.validate()?;
      Ok(config)
   }

   fn validate(&self) -> Result<()> {
      if self.segment_bucket_size_minutes == 0 {
         return Err(Error::Config("segment_bucket_size_minutes must be > 0".to_string()));
      }
      if self.lease_backend == LeaseBackend::ObjectStore && self.segment_lock_bucket.is_none() {
         return Err(Error::Config("segment_lock_bucket is required for the object-store lease backend".to_string()));
      }
      Ok(())
   }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Returns the process-wide configuration, loading it from the environment
/// on first use.
pub fn get() -> &'static Config {
   CONFIG.get_or_init(|| Config::load().expect("invalid configuration"))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn defaults_match_spec() {
      let config = Config::default();
      assert_eq!(config.shared_storage_basedir, "/mnt/otel-hot/segments");
      assert_eq!(config.segment_bucket_size_minutes, 15);
      assert_eq!(config.segment_lock_ttl, 300);
      assert!(config.validate().is_ok());
   }

   #[test]
   fn object_store_backend_requires_bucket() {
      let mut config = Config::default();
      config.lease_backend = LeaseBackend::ObjectStore;
      assert!(config.validate().is_err());
   }
}
