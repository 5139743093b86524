//! Hashing primitives: installation fingerprint and record digests.

pub mod digest;
pub mod fingerprint;
