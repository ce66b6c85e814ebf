//! Filesystem helpers shared by the lease managers and the `doctor` CLI
//! subcommand.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Fsyncs a directory entry so a preceding rename is durable, matching the
/// atomic-write pattern used for lease sentinels and manifest files.
pub fn fsync_dir(path: &Path) -> Result<()> {
   let dir = File::open(path)?;
   dir.sync_all()?;
   Ok(())
}

/// Exercises a create/write/rename/read round trip against the configured
/// storage base, used by `otel-ingest doctor` to confirm the shared mount is
/// writable. Deliberately does not reject network filesystems — unlike a
/// generic local-cache probe, this crate's filesystem lease manager is
/// designed to run *on* NFS.
pub fn probe_storage_path(base: &Path) -> Result<()> {
   fs::create_dir_all(base)?;
   let probe_dir = probe_dir(base);
   fs::create_dir_all(&probe_dir)?;

   let tmp_path = probe_dir.join("rename.tmp");
   let final_path = probe_dir.join("rename.final");
   fs::write(&tmp_path, b"probe")?;
   fs::rename(&tmp_path, &final_path)?;
   let contents = fs::read(&final_path)?;

   let _ = fs::remove_dir_all(&probe_dir);

   if contents != b"probe" {
      return Err(crate::error::Error::Config("storage probe: rename/read-after-write mismatch".to_string()));
   }

   Ok(())
}

fn probe_dir(base: &Path) -> PathBuf {
   let ts = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
   base.join(format!(".otel-ingest-probe-{}-{ts}", std::process::id()))
}
