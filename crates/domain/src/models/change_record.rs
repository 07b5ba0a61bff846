//! Change record domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Fingerprint;

/// Kind of mutation a change record documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Update,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "insert",
            ChangeType::Update => "update",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(ChangeType::Insert),
            "update" => Ok(ChangeType::Update),
            other => Err(format!("unknown change type: {}", other)),
        }
    }
}

/// An entry of a device's audit trail. Never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub id: i64,
    pub device_id: i64,
    pub change_type: ChangeType,
    /// Full field state of the device right after the change.
    #[serde(flatten)]
    pub snapshot: Fingerprint,
    pub changed_at: DateTime<Utc>,
}

/// A change record that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChangeRecord {
    pub device_id: i64,
    pub change_type: ChangeType,
    pub snapshot: Fingerprint,
    pub changed_at: DateTime<Utc>,
}

/// Paginated page of a device's change history.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeHistoryResponse {
    pub device_id: i64,
    pub changes: Vec<ChangeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
