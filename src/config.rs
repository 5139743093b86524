//! Licensing configuration.

use crate::LicensureError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Default licensing service endpoint.
pub const DEFAULT_SERVICE_URL: &str = "https://jsreportonline.net/license-key";

/// Hard bound on the remote verification call.
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Template count up to which a `free` key is accepted without asking the service.
pub const DEFAULT_FREE_TEMPLATE_LIMIT: u64 = 5;

/// Name of the plain-text license key file looked up in the root/data directories.
pub const LICENSE_KEY_FILE_NAME: &str = "license-key.txt";

/// Name of the saved license record under the root directory.
pub const LICENSE_RECORD_FILE_NAME: &str = "license-info.json";

/// Directory under the temp directory holding negative-cache entries.
pub const NEGATIVE_CACHE_DIR_NAME: &str = "licensing";

/// Configuration consumed by the licensing hooks.
#[derive(Debug, Clone)]
pub struct LicensingConfig {
    /// Explicit license key option; wins over any key file.
    pub license_key: Option<String>,

    /// Trust (and refresh) the saved license record.
    pub use_saved_license_info: bool,

    /// Host root directory: holds `license-key.txt` and the saved record.
    pub root_directory: PathBuf,

    /// Optional data directory; a key file here overrides the root one.
    pub data_directory: Option<PathBuf>,

    /// Temp directory; negative-cache entries live under `<temp>/licensing`.
    pub temp_directory: PathBuf,

    /// Host run mode reported to the service (e.g. "production").
    pub mode: String,

    /// Host version reported to the service and bound into caches.
    pub version: String,

    /// Licensing service endpoint.
    pub service_url: String,

    /// Bound on the remote call, measured from call start.
    pub verification_timeout: Duration,

    /// Template count tolerated for `free` keys without a remote call.
    pub free_template_limit: u64,
}

impl LicensingConfig {
    /// Configuration with defaults rooted at `root_directory`.
    pub fn new(root_directory: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            license_key: None,
            use_saved_license_info: true,
            root_directory: root_directory.into(),
            data_directory: None,
            temp_directory: std::env::temp_dir(),
            mode: "production".to_string(),
            version: version.into(),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
            free_template_limit: DEFAULT_FREE_TEMPLATE_LIMIT,
        }
    }

    /// Read configuration from the host's options object.
    ///
    /// Recognized keys: `license-key` / `licenseKey`, `rootDirectory`,
    /// `dataDirectory`, `tempDirectory`, `mode` and
    /// `extensions.licensing.useSavedLicenseInfo`. A missing `rootDirectory`
    /// falls back to `<data dir>/licensure`.
    pub fn from_options(options: &Value, version: &str) -> Result<Self, LicensureError> {
        let root_directory = match string_option(options, "rootDirectory") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    LicensureError::ConfigError("Could not find data directory".to_string())
                })?
                .join("licensure"),
        };

        let mut config = Self::new(root_directory, version);

        config.license_key = string_option(options, "license-key")
            .or_else(|| string_option(options, "licenseKey"))
            .map(str::to_string);

        if let Some(dir) = string_option(options, "dataDirectory") {
            config.data_directory = Some(PathBuf::from(dir));
        }
        if let Some(dir) = string_option(options, "tempDirectory") {
            config.temp_directory = PathBuf::from(dir);
        }
        if let Some(mode) = string_option(options, "mode") {
            config.mode = mode.to_string();
        }

        match options.pointer("/extensions/licensing/useSavedLicenseInfo") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(flag)) => config.use_saved_license_info = *flag,
            Some(other) => {
                return Err(LicensureError::ConfigError(format!(
                    "extensions.licensing.useSavedLicenseInfo must be a boolean, got {}",
                    other
                )))
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicensureError> {
        if self.version.trim().is_empty() {
            return Err(LicensureError::ConfigError(
                "version cannot be empty".to_string(),
            ));
        }
        if self.service_url.is_empty() {
            return Err(LicensureError::ConfigError(
                "service_url cannot be empty".to_string(),
            ));
        }
        if self.verification_timeout.is_zero() {
            return Err(LicensureError::ConfigError(
                "verification_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the saved license record.
    pub fn license_record_path(&self) -> PathBuf {
        self.root_directory.join(LICENSE_RECORD_FILE_NAME)
    }

    /// Directory holding negative-cache entries.
    pub fn negative_cache_dir(&self) -> PathBuf {
        self.temp_directory.join(NEGATIVE_CACHE_DIR_NAME)
    }

    /// Candidate key files, lowest precedence first.
    pub fn license_key_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.root_directory.join(LICENSE_KEY_FILE_NAME)];
        if let Some(data) = &self.data_directory {
            files.push(data.join(LICENSE_KEY_FILE_NAME));
        }
        files
    }
}

/// A non-blank string option.
fn string_option<'a>(options: &'a Value, name: &str) -> Option<&'a str> {
    options
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
