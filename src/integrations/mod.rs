//! Host framework integrations.

pub mod axum;
