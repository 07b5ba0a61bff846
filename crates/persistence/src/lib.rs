//! Persistence layer for the inventory collector.
//!
//! This crate contains:
//! - Database connection management and schema migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The PostgreSQL implementation of the domain's device store

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use store::PgDeviceStore;
