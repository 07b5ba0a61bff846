//! Domain layer for the inventory collector.
//!
//! This crate contains:
//! - Domain models (Fingerprint, DeviceRecord, ChangeRecord)
//! - The reconciliation services
//! - The storage traits and an in-memory store
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::{ReconcileError, ReconcileResult, StoreError, StoreResult};
