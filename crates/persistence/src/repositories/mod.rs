//! Repository implementations for database operations.

pub mod device;
pub mod device_change;

pub use device::DeviceRepository;
pub use device_change::DeviceChangeRepository;
