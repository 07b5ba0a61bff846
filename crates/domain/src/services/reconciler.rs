//! Fingerprint reconciliation.
//!
//! One reconciliation is one storage transaction: lock the identity keys,
//! look up the matching device and lock it, then insert, overwrite, or just
//! stamp the report time, and append the change record in the same
//! transaction.
//!
//! Two reports can reach the same device through different keys (one by MAC,
//! one by serial), so identity locks alone do not order them. The device lock
//! does; after taking it the match is checked again, and a device whose
//! identity moved away while we waited sends the attempt round again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::error::{ReconcileError, ReconcileResult, StoreError};
use crate::models::{DeviceRecord, Fingerprint, IdentityKey, Outcome, Reconciliation};
use crate::services::audit::{self, change_helpers};
use crate::services::diff::{diff, FingerprintDiff};
use crate::services::matcher::find_match;
use crate::services::normalizer::normalize;
use crate::store::{DeviceStore, DeviceTransaction};

/// Default number of re-runs after losing an insert race.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

enum Attempt {
    Done(Reconciliation),
    /// A concurrent transaction claimed one of our identity values first,
    /// or changed the matched device's identity while we waited for it.
    LostRace,
}

/// Reconciles reported fingerprints against the device store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn DeviceStore>,
    max_conflict_retries: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DeviceStore>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// Reconciles one raw fingerprint.
    ///
    /// Either the device write and its change record both persist or
    /// neither does. Losing an insert race rolls back and re-runs the whole
    /// reconciliation, which then finds the winner's device.
    #[instrument(skip(self, raw), fields(mac = tracing::field::Empty, sn = tracing::field::Empty))]
    pub async fn reconcile(&self, raw: Fingerprint) -> ReconcileResult<Reconciliation> {
        let fingerprint = normalize(raw);
        let span = tracing::Span::current();
        span.record("mac", fingerprint.mac.as_str());
        span.record("sn", fingerprint.sn.as_str());

        let keys = fingerprint.identity_keys();
        let max_attempts = self.max_conflict_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let mut tx = self.store.begin().await?;

            match self.run_attempt(tx.as_mut(), &fingerprint, &keys).await {
                Ok(Attempt::Done(reconciliation)) => {
                    info!(
                        device_id = reconciliation.device_id,
                        outcome = reconciliation.outcome.as_str(),
                        name = %fingerprint.name,
                        ip = %fingerprint.ip,
                        attempt,
                        "Fingerprint reconciled"
                    );
                    return Ok(reconciliation);
                }
                Ok(Attempt::LostRace) => {
                    discard(tx.as_mut()).await;
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, "Giving up after repeated insert conflicts");
                        return Err(ReconcileError::ConflictRetriesExhausted { attempts: attempt });
                    }
                    warn!(attempt, "Concurrent reconciliation detected, retrying");
                }
                Err(err) => {
                    discard(tx.as_mut()).await;
                    return Err(err);
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        tx: &mut dyn DeviceTransaction,
        fingerprint: &Fingerprint,
        keys: &[IdentityKey],
    ) -> ReconcileResult<Attempt> {
        tx.lock_identities(keys).await?;

        let reconciliation = match find_match(tx, fingerprint).await? {
            None => match self.insert(tx, fingerprint).await {
                Ok(reconciliation) => reconciliation,
                Err(ReconcileError::Storage(StoreError::UniqueViolation { constraint })) => {
                    debug!(%constraint, "Insert collided with a concurrent insert");
                    return Ok(Attempt::LostRace);
                }
                Err(err) => return Err(err),
            },
            Some(matched) => match self.lock_matched(tx, matched.id, fingerprint).await? {
                Some(device) => self.apply_to_existing(tx, device, fingerprint).await?,
                None => return Ok(Attempt::LostRace),
            },
        };

        match tx.commit().await {
            Ok(()) => Ok(Attempt::Done(reconciliation)),
            Err(StoreError::UniqueViolation { constraint }) => {
                debug!(%constraint, "Commit collided with a concurrent insert");
                Ok(Attempt::LostRace)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Locks the matched device and returns its current state, or `None`
    /// when the fingerprint no longer resolves to it.
    async fn lock_matched(
        &self,
        tx: &mut dyn DeviceTransaction,
        id: i64,
        fingerprint: &Fingerprint,
    ) -> ReconcileResult<Option<DeviceRecord>> {
        let Some(device) = tx.lock_device(id).await? else {
            debug!(device_id = id, "Matched device vanished before it could be locked");
            return Ok(None);
        };

        match find_match(tx, fingerprint).await? {
            Some(current) if current.id == device.id => Ok(Some(device)),
            _ => {
                debug!(device_id = id, "Matched device changed identity while locked");
                Ok(None)
            }
        }
    }

    async fn insert(
        &self,
        tx: &mut dyn DeviceTransaction,
        fingerprint: &Fingerprint,
    ) -> ReconcileResult<Reconciliation> {
        let device = tx.insert_device(fingerprint, Utc::now()).await?;
        audit::append(tx, change_helpers::device_inserted(&device)).await?;

        Ok(Reconciliation {
            outcome: Outcome::Insert,
            device_id: device.id,
        })
    }

    async fn apply_to_existing(
        &self,
        tx: &mut dyn DeviceTransaction,
        device: DeviceRecord,
        fingerprint: &Fingerprint,
    ) -> ReconcileResult<Reconciliation> {
        let now = stamp_for(&device);

        let outcome = match diff(&device.fingerprint, fingerprint) {
            FingerprintDiff::Identical => {
                tx.touch_last_reported(device.id, now).await?;
                Outcome::NoChange
            }
            FingerprintDiff::Changed { fields, incoming } => {
                debug!(device_id = device.id, ?fields, "Device fields changed");
                match tx.update_device(device.id, &incoming, now).await {
                    Ok(()) => {}
                    Err(StoreError::UniqueViolation { constraint }) => {
                        return Err(ReconcileError::IdentityConflict(format!(
                            "device {} cannot take an identity owned by another device ({})",
                            device.id, constraint
                        )));
                    }
                    Err(err) => return Err(err.into()),
                }
                audit::append(tx, change_helpers::device_updated(device.id, &incoming, now))
                    .await?;
                Outcome::Update
            }
        };

        Ok(Reconciliation {
            outcome,
            device_id: device.id,
        })
    }
}

/// Current time, never earlier than anything already stamped on `device`.
fn stamp_for(device: &DeviceRecord) -> DateTime<Utc> {
    Utc::now().max(device.latest_timestamp())
}

async fn discard(tx: &mut dyn DeviceTransaction) {
    match tx.rollback().await {
        Ok(()) | Err(StoreError::TransactionClosed) => {}
        Err(err) => warn!(error = %err, "Rollback failed"),
    }
}
