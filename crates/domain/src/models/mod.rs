//! Domain models for the inventory collector.

pub mod change_record;
pub mod device;
pub mod fingerprint;
pub mod reconciliation;

pub use change_record::{ChangeHistoryResponse, ChangeRecord, ChangeType, NewChangeRecord};
pub use device::{DeviceRecord, DeviceResponse};
pub use fingerprint::{Fingerprint, IdentityKey, SubmitFingerprintRequest, FIELD_NAMES};
pub use reconciliation::{Outcome, Reconciliation, SubmitFingerprintResponse};
