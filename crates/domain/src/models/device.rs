//! Device domain model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Fingerprint;

/// A known device, as last reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub id: i64,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
    pub last_reported_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Only set once a report actually changed a field.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// The most recent timestamp stored on this record.
    ///
    /// New stamps are never allowed to go below this value, which keeps the
    /// device's change history ordered even if the wall clock steps back.
    pub fn latest_timestamp(&self) -> DateTime<Utc> {
        let mut latest = self.created_at.max(self.last_reported_at);
        if let Some(updated_at) = self.updated_at {
            latest = latest.max(updated_at);
        }
        latest
    }
}

/// Device representation returned by the read endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceResponse {
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

impl From<DeviceRecord> for DeviceResponse {
    fn from(device: DeviceRecord) -> Self {
        let fp = device.fingerprint;
        Self {
            id: device.id,
            name: fp.name,
            cpu: fp.cpu,
            ram: fp.ram,
            disk: fp.disk,
            sn: fp.sn,
            mac: fp.mac,
            ip: fp.ip,
            up_ver: fp.up_ver,
            comment: fp.comment,
            network: fp.network,
            last_reported_at: device.last_reported_at,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}
