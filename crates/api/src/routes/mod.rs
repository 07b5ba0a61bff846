//! HTTP route handlers.

pub mod devices;
pub mod fingerprints;
pub mod health;
