//! Installation fingerprint sent to the licensing service as `hostId`.
//!
//! The fingerprint is a one-way hash over the host name and the install
//! directory. It does not depend on process state, so every process started
//! from the same installation on the same machine reports the same id.

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

static CURRENT_HOST_ID: OnceCell<String> = OnceCell::new();

/// Derive the fingerprint for a host name and install path.
pub fn host_fingerprint(hostname: &str, install_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hostname.as_bytes());
    hasher.update(install_path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of the running installation, computed on first use.
///
/// Falls back to empty components if the host name or executable location
/// cannot be determined; the result is still stable for this machine.
pub fn current_host_fingerprint() -> String {
    CURRENT_HOST_ID
        .get_or_init(|| {
            let hostname = hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default();
            host_fingerprint(&hostname, &install_path().to_string_lossy())
        })
        .clone()
}

fn install_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_default()
}
