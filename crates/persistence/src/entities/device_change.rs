//! Device change entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ChangeRecord, ChangeType, Fingerprint};
use sqlx::FromRow;

/// Database enum for the kind of change recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "device_change_type", rename_all = "snake_case")]
pub enum ChangeTypeDb {
    Insert,
    Update,
}

impl From<ChangeType> for ChangeTypeDb {
    fn from(change_type: ChangeType) -> Self {
        match change_type {
            ChangeType::Insert => Self::Insert,
            ChangeType::Update => Self::Update,
        }
    }
}

impl From<ChangeTypeDb> for ChangeType {
    fn from(db: ChangeTypeDb) -> Self {
        match db {
            ChangeTypeDb::Insert => Self::Insert,
            ChangeTypeDb::Update => Self::Update,
        }
    }
}

/// Database row mapping for the device_changes table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceChangeEntity {
    pub id: i64,
    pub device_id: i64,
    pub change_type: ChangeTypeDb,
    pub name: String,
    pub cpu: String,
    pub ram: String,
    pub disk: String,
    pub sn: String,
    pub mac: String,
    pub ip: String,
    pub up_ver: String,
    pub comment: String,
    pub network: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl From<DeviceChangeEntity> for ChangeRecord {
    fn from(entity: DeviceChangeEntity) -> Self {
        Self {
            id: entity.id,
            device_id: entity.device_id,
            change_type: entity.change_type.into(),
            snapshot: Fingerprint {
                name: entity.name,
                cpu: entity.cpu,
                ram: entity.ram,
                disk: entity.disk,
                sn: entity.sn,
                mac: entity.mac,
                ip: entity.ip,
                up_ver: entity.up_ver,
                comment: entity.comment,
                network: entity.network,
            },
            changed_at: entity.changed_at,
        }
    }
}
