//! Device entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{DeviceRecord, Fingerprint};
use sqlx::FromRow;

/// Database row mapping for the devices table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEntity {
    pub id: i64,
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
    pub last_reported_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DeviceEntity> for DeviceRecord {
    fn from(entity: DeviceEntity) -> Self {
        Self {
            id: entity.id,
            fingerprint: Fingerprint {
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
            last_reported_at: entity.last_reported_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
