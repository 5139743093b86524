//! Licensing service protocol types.

pub mod models;
