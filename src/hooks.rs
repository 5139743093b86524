//! Startup and trial entry points.
//!
//! [`Licensing`] ties the orchestrator to the host: it resolves the
//! configured key, asks the document store for the template count, runs the
//! verification and installs the decision into [`LicenseStatus`].

use crate::config::LicensingConfig;
use crate::crypto::fingerprint::current_host_fingerprint;
use crate::manager::{LicenseManager, VerifyOptions};
use crate::protocol::models::LicenseKey;
use crate::status::{LicenseDecision, LicenseStatus};
use crate::LicensureError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counts stored templates; implemented by the host's document store.
pub trait TemplateCounter: Send + Sync + 'static {
    /// Number of templates currently stored.
    fn count_templates(&self) -> impl Future<Output = Result<u64, LicensureError>> + Send;
}

/// Body returned by the manual trial endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResponse {
    /// 0 on success, 1 on any failure.
    pub status: u8,
}

impl TrialResponse {
    /// Trial (or a better license) is in effect.
    pub const STARTED: TrialResponse = TrialResponse { status: 0 };
    /// Trial could not be started; details are in the log.
    pub const FAILED: TrialResponse = TrialResponse { status: 1 };
}

/// Licensing hooks for one host process.
pub struct Licensing<C> {
    config: LicensingConfig,
    manager: LicenseManager,
    templates: C,
    status: Arc<LicenseStatus>,
}

impl<C: TemplateCounter> Licensing<C> {
    /// Hooks for this installation, publishing into [`LicenseStatus::global`].
    pub fn new(config: LicensingConfig, templates: C) -> Result<Self, LicensureError> {
        let manager = LicenseManager::new(&config, current_host_fingerprint())?;
        Ok(Self::with_manager(
            config,
            manager,
            templates,
            LicenseStatus::global(),
        ))
    }

    /// Hooks over an explicit manager and status store.
    pub fn with_manager(
        config: LicensingConfig,
        manager: LicenseManager,
        templates: C,
        status: Arc<LicenseStatus>,
    ) -> Self {
        Self {
            config,
            manager,
            templates,
            status,
        }
    }

    /// Store the decision is published to.
    pub fn status(&self) -> &Arc<LicenseStatus> {
        &self.status
    }

    /// Pick the license key to verify.
    ///
    /// Precedence: explicit option, then `license-key.txt` in the data
    /// directory, then in the root directory, then `free`.
    pub async fn resolve_license_key(&self) -> Result<LicenseKey, LicensureError> {
        if let Some(key) = &self.config.license_key {
            return Ok(LicenseKey::new(key));
        }

        for path in self.config.license_key_files().iter().rev() {
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    debug!(path = %path.display(), "Using license key file");
                    return Ok(LicenseKey::new(&decode_key_file(&bytes)));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(LicensureError::LicenseKeyFile(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Ok(LicenseKey::free())
    }

    /// Host startup hook.
    ///
    /// An `Err` for which [`LicensureError::is_fatal`] holds means the host
    /// must stop starting up.
    pub async fn on_startup(&self) -> Result<LicenseDecision, LicensureError> {
        let key = self.resolve_license_key().await?;
        if key.is_free() {
            info!("Verifying free license");
        } else {
            info!("Verifying license key");
        }

        match self.verify_and_install(&key).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                error!(error = %e, "License verification failed, startup cannot continue");
                Err(e)
            }
        }
    }

    /// Manual trial request. Never fails; errors are logged.
    pub async fn start_trial(&self) -> TrialResponse {
        match self.verify_and_install(&LicenseKey::free()).await {
            Ok(decision) => {
                info!(license = %decision.license, "Trial request verified");
                TrialResponse::STARTED
            }
            Err(e) => {
                warn!(error = %e, "Unable to start trial license");
                TrialResponse::FAILED
            }
        }
    }

    async fn verify_and_install(&self, key: &LicenseKey) -> Result<LicenseDecision, LicensureError> {
        let number_of_templates = self.templates.count_templates().await?;
        let options = VerifyOptions {
            use_saved_license_info: self.config.use_saved_license_info,
            save_license_info: self.config.use_saved_license_info,
        };

        let decision = self.manager.verify(key, number_of_templates, options).await?;
        self.status.install(decision.clone());
        Ok(decision)
    }
}

/// Decode a key file, dropping a UTF-8 or UTF-16 byte-order mark.
fn decode_key_file(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::http::{LicenseService, ServiceFuture};
    use crate::clock::{Clock, SystemClock};
    use crate::protocol::models::{ServiceReply, VerificationRequest};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedTemplates(u64);

    impl TemplateCounter for FixedTemplates {
        async fn count_templates(&self) -> Result<u64, LicensureError> {
            Ok(self.0)
        }
    }

    struct BrokenStore;

    impl TemplateCounter for BrokenStore {
        async fn count_templates(&self) -> Result<u64, LicensureError> {
            Err(LicensureError::TemplateCount("store offline".to_string()))
        }
    }

    /// Records the keys it was asked about and answers with a fixed body.
    struct RecordingService {
        keys: Arc<Mutex<Vec<String>>>,
        body: &'static str,
    }

    impl LicenseService for RecordingService {
        fn submit(&self, request: VerificationRequest) -> ServiceFuture {
            self.keys.lock().unwrap().push(request.license_key);
            let body = self.body.as_bytes().to_vec();
            Box::pin(async move { Ok(ServiceReply { status: 200, body }) })
        }
    }

    const PERPETUAL: &str = r#"{"status":0,"license":"enterprise","type":"perpetual"}"#;
    const REJECTED: &str = r#"{"status":1,"message":"License key is not valid"}"#;

    struct Setup<C> {
        _temp_dir: TempDir,
        licensing: Licensing<C>,
        keys: Arc<Mutex<Vec<String>>>,
    }

    fn setup<C: TemplateCounter>(
        templates: C,
        body: &'static str,
        configure: impl FnOnce(&mut LicensingConfig, &TempDir),
    ) -> Setup<C> {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LicensingConfig::new(temp_dir.path().join("root"), "2.4.0");
        config.temp_directory = temp_dir.path().join("tmp");
        fs::create_dir_all(&config.root_directory).unwrap();
        configure(&mut config, &temp_dir);

        let keys = Arc::new(Mutex::new(Vec::new()));
        let service = RecordingService {
            keys: Arc::clone(&keys),
            body,
        };
        let manager = LicenseManager::with_service(
            &config,
            "test-host",
            Arc::new(service),
            Arc::new(SystemClock) as Arc<dyn Clock>,
        );
        let licensing =
            Licensing::with_manager(config, manager, templates, Arc::new(LicenseStatus::new()));

        Setup {
            _temp_dir: temp_dir,
            licensing,
            keys,
        }
    }

    #[test]
    fn test_decode_key_file_boms() {
        assert_eq!(decode_key_file(b"\xEF\xBB\xBFKEY-1\r\n"), "KEY-1\r\n");
        assert_eq!(decode_key_file(b"\xFF\xFEK\0E\0Y\0"), "KEY");
        assert_eq!(decode_key_file(b"\xFE\xFF\0K\0E\0Y"), "KEY");
        assert_eq!(decode_key_file(b"KEY-1"), "KEY-1");
    }

    #[tokio::test]
    async fn test_option_wins_over_key_file() {
        let setup = setup(FixedTemplates(0), PERPETUAL, |config, _| {
            config.license_key = Some(" OPTION-KEY ".to_string());
            fs::write(config.root_directory.join("license-key.txt"), "FILE-KEY").unwrap();
        });
        let key = setup.licensing.resolve_license_key().await.unwrap();
        assert_eq!(key.as_str(), "OPTION-KEY");
    }

    #[tokio::test]
    async fn test_key_file_with_bom() {
        let setup = setup(FixedTemplates(0), PERPETUAL, |config, _| {
            fs::write(
                config.root_directory.join("license-key.txt"),
                b"\xEF\xBB\xBFFILE-KEY\n",
            )
            .unwrap();
        });
        let key = setup.licensing.resolve_license_key().await.unwrap();
        assert_eq!(key.as_str(), "FILE-KEY");
    }

    #[tokio::test]
    async fn test_data_directory_key_file_wins() {
        let setup = setup(FixedTemplates(0), PERPETUAL, |config, temp_dir| {
            let data = temp_dir.path().join("data");
            fs::create_dir_all(&data).unwrap();
            fs::write(config.root_directory.join("license-key.txt"), "ROOT-KEY").unwrap();
            fs::write(data.join("license-key.txt"), "DATA-KEY").unwrap();
            config.data_directory = Some(data);
        });
        let key = setup.licensing.resolve_license_key().await.unwrap();
        assert_eq!(key.as_str(), "DATA-KEY");
    }

    #[tokio::test]
    async fn test_no_key_means_free() {
        let setup = setup(FixedTemplates(0), PERPETUAL, |_, _| {});
        let key = setup.licensing.resolve_license_key().await.unwrap();
        assert!(key.is_free());
    }

    #[tokio::test]
    async fn test_startup_installs_decision() {
        let setup = setup(FixedTemplates(3), PERPETUAL, |_, _| {});
        let decision = setup.licensing.on_startup().await.unwrap();

        assert_eq!(decision, LicenseDecision::free());
        assert_eq!(setup.licensing.status().current(), Some(decision));
        assert!(setup.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_key_file_stops_startup() {
        let setup = setup(FixedTemplates(3), PERPETUAL, |config, _| {
            fs::create_dir_all(config.root_directory.join("license-key.txt")).unwrap();
        });
        let result = setup.licensing.on_startup().await;

        let error = result.unwrap_err();
        assert!(matches!(error, LicensureError::LicenseKeyFile(_)));
        assert!(!error.is_fatal());
        assert!(setup.keys.lock().unwrap().is_empty());
        assert!(setup.licensing.status().current().is_none());
    }

    #[tokio::test]
    async fn test_startup_rejection_is_fatal() {
        let setup = setup(FixedTemplates(3), REJECTED, |config, _| {
            config.license_key = Some("BAD-KEY".to_string());
        });
        let result = setup.licensing.on_startup().await;

        let error = result.unwrap_err();
        assert!(error.is_fatal());
        assert_eq!(error.to_string(), "License key is not valid");
        assert!(setup.licensing.status().current().is_none());
    }

    #[tokio::test]
    async fn test_trial_success() {
        let setup = setup(FixedTemplates(9), PERPETUAL, |_, _| {});
        assert_eq!(setup.licensing.start_trial().await, TrialResponse::STARTED);
        assert_eq!(*setup.keys.lock().unwrap(), vec!["free".to_string()]);
        assert!(setup.licensing.status().current().is_some());
    }

    #[tokio::test]
    async fn test_trial_failure_is_generic() {
        let setup = setup(FixedTemplates(9), REJECTED, |_, _| {});
        assert_eq!(setup.licensing.start_trial().await, TrialResponse::FAILED);
        // Second attempt hits the negative cache and still fails quietly.
        assert_eq!(setup.licensing.start_trial().await, TrialResponse::FAILED);
        assert_eq!(setup.keys.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trial_with_broken_store() {
        let setup = setup(BrokenStore, PERPETUAL, |_, _| {});
        assert_eq!(setup.licensing.start_trial().await, TrialResponse::FAILED);
    }

    #[test]
    fn test_trial_response_json() {
        assert_eq!(
            serde_json::to_string(&TrialResponse::STARTED).unwrap(),
            r#"{"status":0}"#
        );
        assert_eq!(
            serde_json::to_string(&TrialResponse::FAILED).unwrap(),
            r#"{"status":1}"#
        );
    }
}
