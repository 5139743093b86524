//! The license decision and the process-wide store the host reads it from.

use crate::cache::record::LocalLicenseRecord;
use crate::protocol::models::LicenseType;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDecision {
    /// Tier name (e.g. "free", "enterprise").
    pub license: String,

    /// Kind of license.
    #[serde(rename = "type")]
    pub license_type: LicenseType,

    /// Subscription end, when known.
    pub expires_on: Option<DateTime<Utc>>,

    /// Host version the license was verified for, when verified.
    pub validated_for_version: Option<String>,

    /// Set when the service could not be reached and we failed open.
    pub unreachable: bool,

    /// Whether this attempt wrote a fresh saved record.
    pub license_info_saved: bool,

    /// Whether the decision came from the saved record without a remote call.
    pub from_cache: bool,
}

impl LicenseDecision {
    /// Free tier, decided locally.
    pub fn free() -> Self {
        Self {
            license: "free".to_string(),
            license_type: LicenseType::Free,
            expires_on: None,
            validated_for_version: None,
            unreachable: false,
            license_info_saved: false,
            from_cache: false,
        }
    }

    /// Permissive default used when the service cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            license: "enterprise".to_string(),
            license_type: LicenseType::Enterprise,
            expires_on: None,
            validated_for_version: None,
            unreachable: true,
            license_info_saved: false,
            from_cache: false,
        }
    }

    /// Adopt a verified saved record as-is.
    pub fn from_record(record: &LocalLicenseRecord) -> Self {
        Self {
            license: record.license.clone(),
            license_type: record.license_type.clone(),
            expires_on: record.expires_on,
            validated_for_version: Some(record.validated_for_version.clone()),
            unreachable: false,
            license_info_saved: false,
            from_cache: true,
        }
    }

    /// Whether this acceptance is worth persisting: neither the tier name nor
    /// the license type may be free or trial.
    pub fn is_paid(&self) -> bool {
        let tier_is_free_or_trial = matches!(self.license.as_str(), "free" | "trial");
        !tier_is_free_or_trial && !self.license_type.is_free_or_trial()
    }
}

static GLOBAL: Lazy<Arc<LicenseStatus>> = Lazy::new(|| Arc::new(LicenseStatus::new()));

/// Holder of the current [`LicenseDecision`].
///
/// Only the licensing hooks install decisions. Everything else in the host
/// reads [`current`](Self::current) or watches for changes with
/// [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct LicenseStatus {
    tx: watch::Sender<Option<LicenseDecision>>,
}

impl LicenseStatus {
    /// Empty store; nothing decided yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// The process-wide store.
    pub fn global() -> Arc<LicenseStatus> {
        Arc::clone(&GLOBAL)
    }

    /// Latest decision, if any.
    pub fn current(&self) -> Option<LicenseDecision> {
        self.tx.borrow().clone()
    }

    /// Watch for newly installed decisions.
    pub fn subscribe(&self) -> watch::Receiver<Option<LicenseDecision>> {
        self.tx.subscribe()
    }

    pub(crate) fn install(&self, decision: LicenseDecision) {
        self.tx.send_replace(Some(decision));
    }
}

impl Default for LicenseStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_installed() {
        let status = LicenseStatus::new();
        assert!(status.current().is_none());

        status.install(LicenseDecision::free());
        assert_eq!(status.current(), Some(LicenseDecision::free()));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let status = LicenseStatus::new();
        let mut rx = status.subscribe();

        status.install(LicenseDecision::unreachable());
        rx.changed().await.unwrap();
        let seen = rx.borrow().clone().unwrap();
        assert!(seen.unreachable);
        assert_eq!(seen.license, "enterprise");
    }

    #[test]
    fn test_only_paid_decisions_are_paid() {
        let mut decision = LicenseDecision::unreachable();
        assert!(decision.is_paid());

        decision.license = "free".to_string();
        assert!(!decision.is_paid());

        decision.license = "trial".to_string();
        assert!(!decision.is_paid());

        decision.license = "enterprise".to_string();
        decision.license_type = LicenseType::Trial;
        assert!(!decision.is_paid());

        assert!(!LicenseDecision::free().is_paid());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&LicenseStatus::global(), &LicenseStatus::global()));
    }

    #[test]
    fn test_decision_serializes_wire_names() {
        let json = serde_json::to_string(&LicenseDecision::unreachable()).unwrap();
        assert!(json.contains("\"type\":\"enterprise\""));
        assert!(json.contains("\"licenseInfoSaved\":false"));
        assert!(json.contains("\"unreachable\":true"));
    }
}
