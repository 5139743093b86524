//! Licensing service client and the bounded Remote Verifier.

pub mod http;
pub mod verifier;
