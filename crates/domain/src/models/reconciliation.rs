//! Reconciliation outcome models.

use serde::Serialize;

/// What a single submission did to the device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Insert,
    Update,
    NoChange,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Insert => "insert",
            Outcome::Update => "update",
            Outcome::NoChange => "nochange",
        }
    }

    /// Human-readable summary returned to reporting clients.
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Insert => "Device registered",
            Outcome::Update => "Device record updated",
            Outcome::NoChange => "No changes, report time recorded",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: Outcome,
    pub device_id: i64,
}

/// Response payload for a fingerprint submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitFingerprintResponse {
    pub status: &'static str,
    pub result: Outcome,
    pub device_id: i64,
    pub message: &'static str,
}

impl From<Reconciliation> for SubmitFingerprintResponse {
    fn from(reconciliation: Reconciliation) -> Self {
        Self {
            status: "success",
            result: reconciliation.outcome,
            device_id: reconciliation.device_id,
            message: reconciliation.outcome.message(),
        }
    }
}
