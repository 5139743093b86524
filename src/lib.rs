//! # Licensure
//!
//! **Startup license verification for server hosts.**
//!
//! On every host startup Licensure decides whether the installation is
//! licensed, combining three sources of trust:
//!
//! - **Saved license record**: the last paid verification, sealed with a keyed
//!   digest bound to this installation's fingerprint
//! - **Negative cache**: a rejection seen in the last 60 seconds is replayed
//!   without asking the service again, so restart loops cannot flood it
//! - **Licensing service**: a single call bounded at 3 seconds
//!
//! Network trouble never blocks a legitimate deployment: timeouts, transport
//! errors and unreadable replies fail open to an `enterprise` decision marked
//! `unreachable`. Only an explicit rejection (fresh or cached) stops startup.
//!
//! ## Quickstart
//!
//! ```no_run
//! use licensure::{Licensing, LicensingConfig, LicensureError, TemplateCounter};
//!
//! struct Templates;
//!
//! impl TemplateCounter for Templates {
//!     async fn count_templates(&self) -> Result<u64, LicensureError> {
//!         Ok(3)
//!     }
//! }
//!
//! # async fn run() -> Result<(), LicensureError> {
//! let options = serde_json::json!({ "rootDirectory": "/srv/reports" });
//! let config = LicensingConfig::from_options(&options, "2.4.0")?;
//! let licensing = Licensing::new(config, Templates)?;
//!
//! let decision = licensing.on_startup().await?;
//! println!("Running with {} license", decision.license);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threat Model
//!
//! The saved record digest detects edits and copies between machines. It is
//! tamper evidence, not a signature: anyone with the binary can forge it.

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Hashing
pub mod crypto;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// Decision store
pub mod status;

// Orchestrator
pub mod manager;

// Host entry points
pub mod hooks;

// Optional integrations
pub mod integrations;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::LicensingConfig;
pub use errors::LicensureError;
pub use hooks::{Licensing, TemplateCounter, TrialResponse};
pub use manager::{LicenseManager, VerifyOptions};
pub use protocol::models::{LicenseKey, LicenseType, RemoteOutcome};
pub use status::{LicenseDecision, LicenseStatus};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
