//! Negative result cache.
//!
//! Remembers a recent rejection per license key so a supervisor restarting a
//! misconfigured instance in a tight loop does not hammer the licensing
//! service. An entry is honored only for the same host version and only
//! within [`NEGATIVE_CACHE_TTL_SECONDS`] of the rejection. Successes never touch it.

use crate::cache::write_atomic;
use crate::clock::Clock;
use crate::crypto::digest::hash_license_key;
use crate::LicensureError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// How long a rejection is replayed without asking the service again.
pub const NEGATIVE_CACHE_TTL_SECONDS: i64 = 60;

/// One remembered rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeCacheEntry {
    /// Rejection message from the service.
    pub message: String,

    /// Host version at the time of the rejection.
    pub version: String,

    /// When the rejection happened.
    pub last_verification: DateTime<Utc>,
}

/// File-backed negative cache, one JSON file per license key.
pub struct NegativeCache {
    dir: PathBuf,
    version: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl NegativeCache {
    /// Cache under `dir` bound to the current host `version`.
    pub fn new(dir: impl Into<PathBuf>, version: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            version: version.into(),
            ttl: Duration::seconds(NEGATIVE_CACHE_TTL_SECONDS),
            clock,
        }
    }

    /// Path of the entry for a license key.
    ///
    /// Uses the first 16 hex chars of the key hash so raw keys never end up
    /// in file names.
    pub fn entry_path(&self, license_key: &str) -> PathBuf {
        let hash = hash_license_key(license_key);
        self.dir.join(format!("{}.json", &hash[..16]))
    }

    /// Look up a live rejection for `license_key`.
    ///
    /// `Ok(None)` covers missing, expired and other-version entries; `Err`
    /// is a read or parse failure.
    pub fn try_get(&self, license_key: &str) -> Result<Option<String>, LicensureError> {
        let path = self.entry_path(license_key);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LicensureError::CacheIO(format!(
                    "Failed to read negative cache entry: {}",
                    e
                )))
            }
        };

        let entry: NegativeCacheEntry = serde_json::from_str(&json).map_err(|e| {
            LicensureError::CacheIO(format!("Failed to parse negative cache entry: {}", e))
        })?;

        if entry.version != self.version {
            debug!(
                cached_version = %entry.version,
                version = %self.version,
                "Negative cache entry is for another version"
            );
            return Ok(None);
        }

        let age = self.clock.now_utc().signed_duration_since(entry.last_verification);
        if age > self.ttl || age < Duration::zero() {
            debug!(age_seconds = age.num_seconds(), "Negative cache entry expired");
            return Ok(None);
        }

        Ok(Some(entry.message))
    }

    /// Look up a live rejection, treating every failure as a miss.
    pub fn get(&self, license_key: &str) -> Option<String> {
        match self.try_get(license_key) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring negative cache entry");
                None
            }
        }
    }

    /// Record a rejection for `license_key`.
    pub fn try_put(&self, license_key: &str, message: &str) -> Result<(), LicensureError> {
        let entry = NegativeCacheEntry {
            message: message.to_string(),
            version: self.version.clone(),
            last_verification: self.clock.now_utc(),
        };
        let json = serde_json::to_string(&entry).map_err(|e| {
            LicensureError::CacheIO(format!("Failed to serialize negative cache entry: {}", e))
        })?;
        write_atomic(&self.entry_path(license_key), &json)
    }

    /// Record a rejection; failures are logged and dropped.
    pub fn put(&self, license_key: &str, message: &str) {
        if let Err(e) = self.try_put(license_key, message) {
            warn!(error = %e, "Unable to persist negative cache entry");
        }
    }
}
