//! Domain error types.

use thiserror::Error;

/// Errors raised by a [`crate::store::DeviceStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection loss, pool exhaustion, timeouts, lock contention.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(i64),

    #[error("Transaction already finished")]
    TransactionClosed,

    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the same request may succeed if simply sent again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the reconciler to its caller.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The incoming identity belongs to a different device than the one matched.
    #[error("Identity conflict: {0}")]
    IdentityConflict(String),

    #[error("Concurrent insert conflict persisted after {attempts} attempts")]
    ConflictRetriesExhausted { attempts: u32 },
}

impl ReconcileError {
    /// Whether the caller should retry the submission.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Storage(err) => err.is_transient(),
            ReconcileError::IdentityConflict(_) => false,
            ReconcileError::ConflictRetriesExhausted { .. } => true,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
