//! License Manager - the verification orchestrator.
//!
//! `LicenseManager::verify` combines three trust sources into one decision:
//! - The saved license record (signed, per installation)
//! - The negative cache (recent rejections, per key)
//! - The licensing service (bounded, fail-open)
//!
//! It ends in exactly one [`LicenseDecision`] or exactly one fatal error.

use crate::cache::file::LocalRecordStore;
use crate::cache::negative::NegativeCache;
use crate::cache::record::LocalLicenseRecord;
use crate::client::http::{HttpLicenseService, LicenseService};
use crate::client::verifier::RemoteVerifier;
use crate::clock::{Clock, SystemClock};
use crate::config::LicensingConfig;
use crate::protocol::models::{LicenseKey, LicenseType, RemoteOutcome, VerificationRequest};
use crate::status::LicenseDecision;
use crate::LicensureError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-call switches for [`LicenseManager::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Trust a matching saved record instead of calling the service.
    pub use_saved_license_info: bool,

    /// Write a fresh saved record after a paid acceptance.
    pub save_license_info: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            use_saved_license_info: true,
            save_license_info: true,
        }
    }
}

/// Verification orchestrator.
///
/// Create one per host process; every call is independent.
pub struct LicenseManager {
    mode: String,
    version: String,
    host_id: String,
    free_template_limit: u64,
    clock: Arc<dyn Clock>,
    verifier: RemoteVerifier,
    records: LocalRecordStore,
    rejections: NegativeCache,
}

impl LicenseManager {
    /// Create a manager talking to the configured licensing service.
    ///
    /// `host_id` is the installation fingerprint, usually
    /// [`current_host_fingerprint`](crate::crypto::fingerprint::current_host_fingerprint).
    ///
    /// # Errors
    /// Returns an error if configuration validation or HTTP client creation fails.
    pub fn new(config: &LicensingConfig, host_id: impl Into<String>) -> Result<Self, LicensureError> {
        config.validate()?;
        let service = HttpLicenseService::new(config)?;
        Ok(Self::with_service(
            config,
            host_id,
            Arc::new(service),
            Arc::new(SystemClock),
        ))
    }

    /// Create a manager over an arbitrary service and clock.
    pub fn with_service(
        config: &LicensingConfig,
        host_id: impl Into<String>,
        service: Arc<dyn LicenseService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mode: config.mode.clone(),
            version: config.version.clone(),
            host_id: host_id.into(),
            free_template_limit: config.free_template_limit,
            verifier: RemoteVerifier::new(service, config.verification_timeout),
            records: LocalRecordStore::new(config.license_record_path()),
            rejections: NegativeCache::new(
                config.negative_cache_dir(),
                config.version.clone(),
                Arc::clone(&clock),
            ),
            clock,
        }
    }

    /// Decide the license for this installation.
    ///
    /// Order of trust:
    /// 1. A verified saved record matching the key and still current
    /// 2. A `free` key with few templates (no network)
    /// 3. The negative cache (fatal on hit)
    /// 4. The licensing service (fail-open on trouble)
    ///
    /// # Errors
    /// - `RecentlyRejected` - the key was rejected within the negative-cache TTL
    /// - `LicenseRejected` - the service explicitly rejected the key
    pub async fn verify(
        &self,
        license_key: &LicenseKey,
        number_of_templates: u64,
        options: VerifyOptions,
    ) -> Result<LicenseDecision, LicensureError> {
        let saved = if options.use_saved_license_info {
            self.records.load(&self.host_id)
        } else {
            None
        };

        let mut effective_key = license_key.clone();

        match saved {
            None => {
                if license_key.is_free() && number_of_templates <= self.free_template_limit {
                    debug!(number_of_templates, "Free license within template limit");
                    return Ok(LicenseDecision::free());
                }
            }
            Some(record) if record.license_key != license_key.as_str() => {
                if license_key.is_free() {
                    // A previously verified key keeps applying when the
                    // configuration falls back to "free".
                    info!("Using previously verified license key");
                    effective_key = LicenseKey::new(&record.license_key);
                }
            }
            Some(record) => {
                if self.is_saved_record_current(&record) {
                    info!(license = %record.license, "Using saved license information");
                    return Ok(LicenseDecision::from_record(&record));
                }
                debug!("Saved license information is stale, verifying again");
            }
        }

        self.verify_remotely(&effective_key, number_of_templates, options)
            .await
    }

    /// Subscriptions are current until they expire; everything else until
    /// the host version changes.
    fn is_saved_record_current(&self, record: &LocalLicenseRecord) -> bool {
        match record.license_type {
            LicenseType::Subscription => record
                .expires_on
                .is_some_and(|expires_on| expires_on > self.clock.now_utc()),
            _ => record.validated_for_version == self.version,
        }
    }

    async fn verify_remotely(
        &self,
        license_key: &LicenseKey,
        number_of_templates: u64,
        options: VerifyOptions,
    ) -> Result<LicenseDecision, LicensureError> {
        if let Some(message) = self.rejections.get(license_key.as_str()) {
            error!(%message, "License key was rejected moments ago");
            return Err(LicensureError::RecentlyRejected { message });
        }

        let request = VerificationRequest {
            license_key: license_key.as_str().to_string(),
            mode: self.mode.clone(),
            number_of_templates,
            version: self.version.clone(),
            host_id: self.host_id.clone(),
        };

        match self.verifier.verify(request).await {
            RemoteOutcome::Unreachable => {
                warn!("Unable to verify license key, assuming enterprise");
                Ok(LicenseDecision::unreachable())
            }
            RemoteOutcome::Rejected { message } => {
                self.rejections.put(license_key.as_str(), &message);
                error!(%message, "License key rejected");
                Err(LicensureError::LicenseRejected { message })
            }
            RemoteOutcome::Accepted {
                license,
                license_type,
                expires_on,
                message,
            } => {
                if let Some(message) = message {
                    info!("{}", message);
                }

                let mut decision = LicenseDecision {
                    license,
                    license_type,
                    expires_on,
                    validated_for_version: Some(self.version.clone()),
                    unreachable: false,
                    license_info_saved: false,
                    from_cache: false,
                };

                if options.save_license_info && decision.is_paid() {
                    decision.license_info_saved = self.save_record(license_key, &decision);
                }

                Ok(decision)
            }
        }
    }

    /// Persist the accepted license; a failure only costs the next startup a
    /// remote call.
    fn save_record(&self, license_key: &LicenseKey, decision: &LicenseDecision) -> bool {
        let saved = LocalLicenseRecord::sealed(
            license_key.as_str().to_string(),
            self.version.clone(),
            decision.expires_on,
            decision.license.clone(),
            decision.license_type.clone(),
            &self.host_id,
        )
        .and_then(|record| self.records.save(&record));

        match saved {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    path = %self.records.path().display(),
                    error = %e,
                    "Unable to save license information"
                );
                false
            }
        }
    }
}
