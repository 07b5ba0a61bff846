//! Storage abstraction used by the reconciler.
//!
//! The infrastructure layer (PostgreSQL in production, [`InMemoryDeviceStore`]
//! for tests and embedding) implements these traits.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{ChangeRecord, DeviceRecord, Fingerprint, IdentityKey, NewChangeRecord};

pub use memory::InMemoryDeviceStore;

/// Handle to the device and change tables.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Starts a unit of work. Dropping the transaction without committing
    /// discards everything done in it.
    async fn begin(&self) -> StoreResult<Box<dyn DeviceTransaction>>;

    /// Reads the committed state of a device.
    async fn get_device(&self, id: i64) -> StoreResult<Option<DeviceRecord>>;

    /// Lists a device's change records ordered by `(changed_at, id)`,
    /// starting strictly after `after` when given.
    async fn list_changes(
        &self,
        device_id: i64,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> StoreResult<Vec<ChangeRecord>>;

    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// One atomic reconciliation unit.
#[async_trait]
pub trait DeviceTransaction: Send {
    /// Takes exclusive locks on the given identity keys until commit or
    /// rollback. Keys must be passed in sorted order.
    async fn lock_identities(&mut self, keys: &[IdentityKey]) -> StoreResult<()>;

    /// First device (by id) whose non-empty `mac` or `sn` equals the given one.
    async fn find_by_identity(
        &mut self,
        mac: Option<&str>,
        sn: Option<&str>,
    ) -> StoreResult<Option<DeviceRecord>>;

    /// Locks a device until commit or rollback and returns its state as of
    /// acquiring the lock, or `None` if it no longer exists. Taken after
    /// identity locks, at most once per transaction.
    async fn lock_device(&mut self, id: i64) -> StoreResult<Option<DeviceRecord>>;

    /// Creates a device. Fails with `UniqueViolation` when another device
    /// already owns one of the non-empty identity values.
    async fn insert_device(
        &mut self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRecord>;

    /// Overwrites every field and sets `updated_at` and `last_reported_at`.
    async fn update_device(
        &mut self,
        id: i64,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Sets only `last_reported_at`.
    async fn touch_last_reported(&mut self, id: i64, now: DateTime<Utc>) -> StoreResult<()>;

    async fn append_change(&mut self, change: NewChangeRecord) -> StoreResult<ChangeRecord>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;
}
