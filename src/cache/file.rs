//! Saved license record store.
//!
//! Loading fails soft: a missing, unreadable, unparseable or tampered record
//! is reported as absent. Saving uses temp file + rename.

use crate::cache::record::LocalLicenseRecord;
use crate::cache::write_atomic;
use crate::LicensureError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File-backed store for the saved license record.
#[derive(Debug, Clone)]
pub struct LocalRecordStore {
    path: PathBuf,
}

impl LocalRecordStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and verify the record.
    ///
    /// `Ok(None)` means no record was saved; `Err` is a real read, parse or
    /// tamper failure.
    pub fn try_load(&self, host_id: &str) -> Result<Option<LocalLicenseRecord>, LicensureError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LicensureError::CacheIO(format!(
                    "Failed to read license record: {}",
                    e
                )))
            }
        };

        let record = LocalLicenseRecord::from_json(&json)?;
        record.verify(host_id)?;
        Ok(Some(record))
    }

    /// Load the record, treating every failure as absent.
    pub fn load(&self, host_id: &str) -> Option<LocalLicenseRecord> {
        match self.try_load(host_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring saved license record");
                None
            }
        }
    }

    /// Persist a sealed record, replacing any previous one.
    pub fn save(&self, record: &LocalLicenseRecord) -> Result<(), LicensureError> {
        write_atomic(&self.path, &record.to_json()?)
    }
}
