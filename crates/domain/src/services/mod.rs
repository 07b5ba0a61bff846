//! Domain services for the inventory collector.
//!
//! Services contain the reconciliation logic that operates on domain models.

pub mod audit;
pub mod diff;
pub mod matcher;
pub mod normalizer;
pub mod reconciler;

pub use audit::{change_helpers, ChangeRecordBuilder};
pub use diff::{diff, FingerprintDiff};
pub use matcher::find_match;
pub use normalizer::{canonicalize_mac, normalize};
pub use reconciler::{Reconciler, DEFAULT_MAX_CONFLICT_RETRIES};
