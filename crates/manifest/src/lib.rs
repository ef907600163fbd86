//! File-backed progress ledger.
//!
//! Persists a [`ProgressRecord`] as a JSON manifest next to the run's
//! other artifacts, so an interrupted population run can resume from
//! where it stopped.

use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use statefill_core::{
    error::Error,
    ledger::{LedgerOps, ProgressRecord},
    Result,
};

/// JSON manifest ledger. A missing file means a fresh run; commits
/// are atomic (write-to-temp, fsync, rename), so a crash mid-commit
/// leaves the previous manifest intact.
pub struct JsonManifest {
    path: PathBuf,
    /// Record returned when the manifest does not exist yet.
    initial: ProgressRecord,
}

impl JsonManifest {
    pub fn new(path: impl Into<PathBuf>, initial: ProgressRecord) -> Self {
        Self {
            path: path.into(),
            initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_record(&self) -> Result<ProgressRecord> {
        let raw = fs::read_to_string(&self.path)?;
        let record: ProgressRecord = serde_json::from_str(&raw)?;
        Ok(record)
    }

    fn write_record(&self, record: &ProgressRecord) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        // temp file in the target directory, so the rename below
        // never crosses a filesystem boundary
        let tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new_in(".")?,
        };
        serde_json::to_writer_pretty(tmp.as_file(), record)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Ledger(format!("manifest rename failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerOps for JsonManifest {
    async fn load(&self) -> Result<ProgressRecord> {
        if !self.path.exists() {
            info!("no manifest at {}; starting fresh", self.path.display());
            return Ok(self.initial.clone());
        }
        let record = self.read_record()?;
        debug!(
            "loaded manifest {}: {}/{} completed",
            self.path.display(),
            record.completed_count,
            record.target_count
        );
        Ok(record)
    }

    async fn commit(&self, record: &ProgressRecord) -> Result<()> {
        self.write_record(record)?;
        debug!(
            "committed manifest {}: {}/{}",
            self.path.display(),
            record.completed_count,
            record.target_count
        );
        Ok(())
    }
}
