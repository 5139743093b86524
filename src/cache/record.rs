//! Saved license record format.
//!
//! The record remembers the last successful paid verification so the next
//! startup can skip the network. It carries a `securityHash` computed over
//! every other field, serialized in a fixed order and keyed by the host
//! fingerprint. On load:
//! 1. Re-serialize the payload fields canonically
//! 2. Recompute the keyed digest
//! 3. Compare against `securityHash`; any difference means "untrusted"

use crate::crypto::digest::{keyed_digest, verify_keyed_digest};
use crate::protocol::models::LicenseType;
use crate::LicensureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted result of the last successful paid verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalLicenseRecord {
    /// Key that was verified.
    pub license_key: String,

    /// Host version the verification was performed for.
    pub validated_for_version: String,

    /// Subscription end, if the license expires.
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,

    /// Tier name granted by the service.
    pub license: String,

    /// Kind of license.
    #[serde(rename = "type")]
    pub license_type: LicenseType,

    /// Keyed digest over all fields above.
    pub security_hash: String,
}

/// Digest input. Field order here is the canonical serialization order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordPayload<'a> {
    license_key: &'a str,
    validated_for_version: &'a str,
    expires_on: Option<&'a DateTime<Utc>>,
    license: &'a str,
    #[serde(rename = "type")]
    license_type: &'a str,
}

impl LocalLicenseRecord {
    /// Build a record and seal it with a fresh security hash.
    pub fn sealed(
        license_key: String,
        validated_for_version: String,
        expires_on: Option<DateTime<Utc>>,
        license: String,
        license_type: LicenseType,
        host_id: &str,
    ) -> Result<Self, LicensureError> {
        let mut record = Self {
            license_key,
            validated_for_version,
            expires_on,
            license,
            license_type,
            security_hash: String::new(),
        };
        record.security_hash = keyed_digest(host_id, &record.payload_bytes()?);
        Ok(record)
    }

    fn payload_bytes(&self) -> Result<Vec<u8>, LicensureError> {
        let payload = RecordPayload {
            license_key: &self.license_key,
            validated_for_version: &self.validated_for_version,
            expires_on: self.expires_on.as_ref(),
            license: &self.license,
            license_type: self.license_type.as_str(),
        };
        serde_json::to_vec(&payload)
            .map_err(|e| LicensureError::CacheIO(format!("Failed to serialize record: {}", e)))
    }

    /// Check the security hash against this installation's fingerprint.
    pub fn verify(&self, host_id: &str) -> Result<(), LicensureError> {
        if verify_keyed_digest(host_id, &self.payload_bytes()?, &self.security_hash) {
            Ok(())
        } else {
            Err(LicensureError::CacheTampered)
        }
    }

    /// Serialize the record to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, LicensureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LicensureError::CacheIO(format!("Failed to serialize record: {}", e)))
    }

    /// Deserialize a record from JSON.
    pub fn from_json(json: &str) -> Result<Self, LicensureError> {
        serde_json::from_str(json)
            .map_err(|e| LicensureError::CacheIO(format!("Failed to deserialize record: {}", e)))
    }
}
