//! Shared utilities and common types for the inventory collector.
//!
//! This crate provides common functionality used across all other crates:
//! - Cursor pagination for history listings
//! - Common validation logic

pub mod pagination;
pub mod validation;
