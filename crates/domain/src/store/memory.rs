//! In-memory device store.
//!
//! Behaves like the PostgreSQL store where the reconciler can observe it:
//! transactions buffer their writes until commit, identity and device locks
//! are held until the transaction ends, and non-empty `mac`/`sn` values are
//! unique.
//! Used by tests and for embedding the collector without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use super::{DeviceStore, DeviceTransaction};
use crate::error::{StoreError, StoreResult};
use crate::models::{ChangeRecord, DeviceRecord, Fingerprint, IdentityKey, NewChangeRecord};

const MAC_CONSTRAINT: &str = "devices_mac_key";
const SN_CONSTRAINT: &str = "devices_sn_key";

#[derive(Debug, Default)]
struct MemoryState {
    devices: BTreeMap<i64, DeviceRecord>,
    changes: Vec<ChangeRecord>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<MemoryState>,
    next_device_id: AtomicI64,
    next_change_id: AtomicI64,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    identity_locking: bool,
    fail_change_appends: AtomicBool,
    unavailable: AtomicBool,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.key_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

/// Shared, cloneable in-memory store.
#[derive(Debug, Clone)]
pub struct InMemoryDeviceStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDeviceStore {
    /// Creates an empty store with per-identity locking.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Creates a store whose `lock_identities` is a no-op, leaving only the
    /// uniqueness constraints to catch concurrent inserts. Device locks are
    /// still taken.
    pub fn without_identity_locks() -> Self {
        Self::build(false)
    }

    fn build(identity_locking: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MemoryState::default()),
                next_device_id: AtomicI64::new(0),
                next_change_id: AtomicI64::new(0),
                key_locks: Mutex::new(HashMap::new()),
                identity_locking,
                fail_change_appends: AtomicBool::new(false),
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Makes every subsequent `append_change` fail with a transient error.
    pub fn fail_change_appends(&self, fail: bool) {
        self.inner.fail_change_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent store call fail with a transient error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Committed devices in id order.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.inner.state().devices.values().cloned().collect()
    }

    /// Committed change records in append order.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.inner.state().changes.clone()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn begin(&self) -> StoreResult<Box<dyn DeviceTransaction>> {
        self.inner.check_available()?;
        Ok(Box::new(InMemoryTransaction {
            inner: self.inner.clone(),
            guards: Vec::new(),
            pending: BTreeMap::new(),
            changes: Vec::new(),
            finished: false,
        }))
    }

    async fn get_device(&self, id: i64) -> StoreResult<Option<DeviceRecord>> {
        self.inner.check_available()?;
        Ok(self.inner.state().devices.get(&id).cloned())
    }

    async fn list_changes(
        &self,
        device_id: i64,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> StoreResult<Vec<ChangeRecord>> {
        self.inner.check_available()?;
        let state = self.inner.state();
        let mut changes: Vec<ChangeRecord> = state
            .changes
            .iter()
            .filter(|c| c.device_id == device_id)
            .filter(|c| after.map_or(true, |cursor| (c.changed_at, c.id) > cursor))
            .cloned()
            .collect();
        changes.sort_by_key(|c| (c.changed_at, c.id));
        changes.truncate(limit.max(0) as usize);
        Ok(changes)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.check_available()
    }
}

/// Lock held on one named key. Dropping it forgets the key's mutex unless
/// another transaction is waiting on it.
struct KeyGuard {
    inner: Arc<Inner>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.inner.key_locks();
        if locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Transaction over [`InMemoryDeviceStore`]; writes become visible on commit.
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    guards: Vec<KeyGuard>,
    /// Devices created or modified in this transaction, by id.
    pending: BTreeMap<i64, DeviceRecord>,
    changes: Vec<ChangeRecord>,
    finished: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.finished {
            return Err(StoreError::TransactionClosed);
        }
        self.inner.check_available()
    }

    /// Acquires the named locks in the given order.
    async fn acquire(&mut self, keys: Vec<String>) {
        let mutexes: Vec<(String, Arc<tokio::sync::Mutex<()>>)> = {
            let mut locks = self.inner.key_locks();
            keys.into_iter()
                .map(|key| {
                    let mutex = locks.entry(key.clone()).or_default().clone();
                    (key, mutex)
                })
                .collect()
        };

        for (key, mutex) in mutexes {
            let guard = mutex.lock_owned().await;
            self.guards.push(KeyGuard {
                inner: self.inner.clone(),
                key,
                guard: Some(guard),
            });
        }
    }

    /// Device as seen from inside this transaction.
    fn visible(&self, state: &MemoryState, id: i64) -> Option<DeviceRecord> {
        self.pending
            .get(&id)
            .or_else(|| state.devices.get(&id))
            .cloned()
    }

    fn visible_ids(&self, state: &MemoryState) -> BTreeSet<i64> {
        state
            .devices
            .keys()
            .chain(self.pending.keys())
            .copied()
            .collect()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.pending.clear();
        self.changes.clear();
        self.guards.clear();
    }
}

/// Fails when a device other than `id` already owns one of `fingerprint`'s
/// non-empty identity values.
fn check_unique<'a>(
    others: impl IntoIterator<Item = &'a DeviceRecord>,
    id: i64,
    fingerprint: &Fingerprint,
) -> StoreResult<()> {
    for other in others {
        if other.id == id {
            continue;
        }
        if !fingerprint.mac.is_empty() && other.fingerprint.mac == fingerprint.mac {
            return Err(StoreError::UniqueViolation {
                constraint: MAC_CONSTRAINT.to_string(),
            });
        }
        if !fingerprint.sn.is_empty() && other.fingerprint.sn == fingerprint.sn {
            return Err(StoreError::UniqueViolation {
                constraint: SN_CONSTRAINT.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DeviceTransaction for InMemoryTransaction {
    async fn lock_identities(&mut self, keys: &[IdentityKey]) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.inner.identity_locking {
            return Ok(());
        }
        self.acquire(keys.iter().map(IdentityKey::lock_key).collect())
            .await;
        Ok(())
    }

    async fn lock_device(&mut self, id: i64) -> StoreResult<Option<DeviceRecord>> {
        self.ensure_open()?;
        self.acquire(vec![format!("device:{id}")]).await;
        let state = self.inner.state();
        Ok(self.visible(&state, id))
    }

    async fn find_by_identity(
        &mut self,
        mac: Option<&str>,
        sn: Option<&str>,
    ) -> StoreResult<Option<DeviceRecord>> {
        self.ensure_open()?;
        let mac = mac.filter(|m| !m.is_empty());
        let sn = sn.filter(|s| !s.is_empty());
        if mac.is_none() && sn.is_none() {
            return Ok(None);
        }

        let state = self.inner.state();
        for id in self.visible_ids(&state) {
            if let Some(device) = self.visible(&state, id) {
                let fp = &device.fingerprint;
                let mac_hit = mac.is_some_and(|m| fp.mac == m);
                let sn_hit = sn.is_some_and(|s| fp.sn == s);
                if mac_hit || sn_hit {
                    return Ok(Some(device));
                }
            }
        }
        Ok(None)
    }

    async fn insert_device(
        &mut self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRecord> {
        self.ensure_open()?;
        let id = self.inner.next_device_id.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let state = self.inner.state();
            let visible: Vec<DeviceRecord> = self
                .visible_ids(&state)
                .into_iter()
                .filter_map(|other| self.visible(&state, other))
                .collect();
            check_unique(&visible, id, fingerprint)?;
        }

        let device = DeviceRecord {
            id,
            fingerprint: fingerprint.clone(),
            last_reported_at: now,
            created_at: now,
            updated_at: None,
        };
        self.pending.insert(id, device.clone());
        Ok(device)
    }

    async fn update_device(
        &mut self,
        id: i64,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        let mut device = {
            let state = self.inner.state();
            let visible: Vec<DeviceRecord> = self
                .visible_ids(&state)
                .into_iter()
                .filter_map(|other| self.visible(&state, other))
                .collect();
            check_unique(&visible, id, fingerprint)?;
            self.visible(&state, id)
                .ok_or(StoreError::DeviceNotFound(id))?
        };

        device.fingerprint = fingerprint.clone();
        device.updated_at = Some(now);
        device.last_reported_at = now;
        self.pending.insert(id, device);
        Ok(())
    }

    async fn touch_last_reported(&mut self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        self.ensure_open()?;
        let mut device = {
            let state = self.inner.state();
            self.visible(&state, id)
                .ok_or(StoreError::DeviceNotFound(id))?
        };
        device.last_reported_at = now;
        self.pending.insert(id, device);
        Ok(())
    }

    async fn append_change(&mut self, change: NewChangeRecord) -> StoreResult<ChangeRecord> {
        self.ensure_open()?;
        if self.inner.fail_change_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "change table rejected the append".into(),
            ));
        }
        let record = ChangeRecord {
            id: self.inner.next_change_id.fetch_add(1, Ordering::SeqCst) + 1,
            device_id: change.device_id,
            change_type: change.change_type,
            snapshot: change.snapshot,
            changed_at: change.changed_at,
        };
        self.changes.push(record.clone());
        Ok(record)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        let result = {
            let mut state = self.inner.state();
            let conflict = self.pending.values().try_for_each(|device| {
                let committed = state
                    .devices
                    .values()
                    .filter(|other| !self.pending.contains_key(&other.id));
                check_unique(committed, device.id, &device.fingerprint)
            });
            match conflict {
                Ok(()) => {
                    for (id, device) in std::mem::take(&mut self.pending) {
                        state.devices.insert(id, device);
                    }
                    state.changes.append(&mut self.changes);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };
        self.finish();
        result
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if self.finished {
            return Err(StoreError::TransactionClosed);
        }
        self.finish();
        Ok(())
    }
}
