//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod device;
pub mod device_change;

pub use device::DeviceEntity;
pub use device_change::{ChangeTypeDb, DeviceChangeEntity};
