//! Keyed SHA-256 digests for tamper evidence.
//!
//! The saved license record carries a `securityHash` computed over its own
//! fields. The digest is keyed by a fixed product salt and the installation
//! fingerprint, so a record copied to another machine no longer verifies.
//! This is tamper *evidence* against casual edits, not a signature scheme.

use sha2::{Digest, Sha256};

/// Product salt mixed into every record digest.
const RECORD_DIGEST_SALT: &[u8] = b"licensure/local-license-record/v1";

/// Compute the keyed digest of a serialized payload, hex-encoded.
///
/// Fields are separated with a NUL byte so `("ab", "c")` and `("a", "bc")`
/// can never collide.
pub fn keyed_digest(host_id: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RECORD_DIGEST_SALT);
    hasher.update([0u8]);
    hasher.update(host_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Compare a stored digest against a freshly computed one, byte for byte.
pub fn verify_keyed_digest(host_id: &str, payload: &[u8], expected_hex: &str) -> bool {
    keyed_digest(host_id, payload).as_bytes() == expected_hex.as_bytes()
}

/// Compute a SHA-256 hash of a license key.
///
/// Used to derive cache file names without putting raw keys on disk.
pub fn hash_license_key(license_key: &str) -> String {
    hex::encode(Sha256::digest(license_key.as_bytes()))
}
