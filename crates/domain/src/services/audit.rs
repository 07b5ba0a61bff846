//! Change history recording.
//!
//! Every insert and every update of a device appends one change record
//! holding the full post-change snapshot. Records are written through the
//! caller's transaction so they commit or roll back with the device write.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreResult;
use crate::models::{ChangeRecord, ChangeType, DeviceRecord, Fingerprint, NewChangeRecord};
use crate::store::DeviceTransaction;

/// Builder for change records with a fluent API.
#[derive(Debug, Clone)]
pub struct ChangeRecordBuilder {
    device_id: i64,
    change_type: ChangeType,
    snapshot: Fingerprint,
    changed_at: Option<DateTime<Utc>>,
}

impl ChangeRecordBuilder {
    /// Record for a newly created device.
    pub fn insert(device_id: i64) -> Self {
        Self::new(device_id, ChangeType::Insert)
    }

    /// Record for an overwritten device.
    pub fn update(device_id: i64) -> Self {
        Self::new(device_id, ChangeType::Update)
    }

    fn new(device_id: i64, change_type: ChangeType) -> Self {
        Self {
            device_id,
            change_type,
            snapshot: Fingerprint::default(),
            changed_at: None,
        }
    }

    /// Set the post-change field values.
    pub fn with_snapshot(mut self, snapshot: Fingerprint) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Set the change time. Defaults to now.
    pub fn at(mut self, changed_at: DateTime<Utc>) -> Self {
        self.changed_at = Some(changed_at);
        self
    }

    pub fn build(self) -> NewChangeRecord {
        NewChangeRecord {
            device_id: self.device_id,
            change_type: self.change_type,
            snapshot: self.snapshot,
            changed_at: self.changed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Appends a change record inside `tx`.
///
/// A failure here must abort the surrounding transaction; the caller
/// propagates it and never commits.
pub async fn append(
    tx: &mut dyn DeviceTransaction,
    builder: ChangeRecordBuilder,
) -> StoreResult<ChangeRecord> {
    let change = builder.build();
    let record = tx.append_change(change).await?;
    debug!(
        device_id = record.device_id,
        change_id = record.id,
        change_type = %record.change_type,
        "Change record appended"
    );
    Ok(record)
}

/// Shorthands for the two kinds of change the reconciler records.
pub mod change_helpers {
    use super::*;

    /// Change record for a device that was just created.
    pub fn device_inserted(device: &DeviceRecord) -> ChangeRecordBuilder {
        ChangeRecordBuilder::insert(device.id)
            .with_snapshot(device.fingerprint.clone())
            .at(device.created_at)
    }

    /// Change record for a device whose fields were overwritten.
    pub fn device_updated(
        device_id: i64,
        snapshot: &Fingerprint,
        changed_at: DateTime<Utc>,
    ) -> ChangeRecordBuilder {
        ChangeRecordBuilder::update(device_id)
            .with_snapshot(snapshot.clone())
            .at(changed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeviceStore, InMemoryDeviceStore};
    use chrono::TimeZone;

    fn snapshot() -> Fingerprint {
        Fingerprint {
            name: "host-01".to_string(),
            mac: "aabb.ccdd.eeff".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_sets_fields() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let change = ChangeRecordBuilder::update(7)
            .with_snapshot(snapshot())
            .at(at)
            .build();

        assert_eq!(change.device_id, 7);
        assert_eq!(change.change_type, ChangeType::Update);
        assert_eq!(change.snapshot, snapshot());
        assert_eq!(change.changed_at, at);
    }

    #[test]
    fn test_builder_defaults_time_to_now() {
        let before = Utc::now();
        let change = ChangeRecordBuilder::insert(1).build();
        assert!(change.changed_at >= before);
        assert_eq!(change.change_type, ChangeType::Insert);
    }

    #[test]
    fn test_device_inserted_uses_creation_time() {
        let created = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let device = DeviceRecord {
            id: 3,
            fingerprint: snapshot(),
            last_reported_at: created,
            created_at: created,
            updated_at: None,
        };
        let change = change_helpers::device_inserted(&device).build();
        assert_eq!(change.changed_at, created);
        assert_eq!(change.snapshot, device.fingerprint);
    }

    #[tokio::test]
    async fn test_append_goes_through_transaction() {
        let store = InMemoryDeviceStore::new();
        let mut tx = store.begin().await.unwrap();
        let device = tx.insert_device(&snapshot(), Utc::now()).await.unwrap();

        let record = append(tx.as_mut(), change_helpers::device_inserted(&device))
            .await
            .unwrap();
        assert_eq!(record.device_id, device.id);
        assert!(store.changes().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.changes().len(), 1);
    }
}
