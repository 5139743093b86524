//! Licensure error types.

use thiserror::Error;

/// Errors that can occur during license verification.
#[derive(Debug, Error)]
pub enum LicensureError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP transport error talking to the licensing service.
    #[error("Licensing service transport error: {0}")]
    ServiceTransport(String),

    /// Failed to interpret a licensing service reply.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Cache I/O or (de)serialization error.
    #[error("Cache I/O error: {0}")]
    CacheIO(String),

    /// Saved license record does not match its security hash.
    #[error("Saved license record tampering detected")]
    CacheTampered,

    /// The licensing service explicitly rejected the license key.
    #[error("{message}")]
    LicenseRejected {
        /// Human-readable reason supplied by the service.
        message: String,
    },

    /// The same key was rejected moments ago; the service was not asked again.
    #[error("{message}")]
    RecentlyRejected {
        /// The rejection message remembered from the previous attempt.
        message: String,
    },

    /// The document store could not count templates.
    #[error("Unable to count templates: {0}")]
    TemplateCount(String),

    /// The license key file exists but could not be read.
    #[error("Unable to read license key file: {0}")]
    LicenseKeyFile(String),
}

impl LicensureError {
    /// Whether this error must stop host startup.
    ///
    /// Only an explicit rejection by the service, or a fresh negative-cache
    /// hit for the same key, is fatal. Everything else resolves to a decision.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LicensureError::LicenseRejected { .. } | LicensureError::RecentlyRejected { .. }
        )
    }
}
