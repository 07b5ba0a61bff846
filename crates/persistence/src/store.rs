//! PostgreSQL implementation of the domain device store.
//!
//! Identity keys are serialized with transaction-scoped advisory locks and
//! matched devices with row locks; the partial unique indexes on
//! `devices.mac` and `devices.sn` catch anything that slips past them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::{StoreError, StoreResult};
use domain::models::{
    ChangeRecord, DeviceRecord, Fingerprint, IdentityKey, NewChangeRecord,
};
use domain::store::{DeviceStore, DeviceTransaction};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::metrics::record_pool_metrics;
use crate::repositories::{DeviceChangeRepository, DeviceRepository};

pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// Device store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgDeviceStore {
    pool: PgPool,
    devices: DeviceRepository,
    changes: DeviceChangeRepository,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            devices: DeviceRepository::new(pool.clone()),
            changes: DeviceChangeRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn begin(&self) -> StoreResult<Box<dyn DeviceTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgDeviceTransaction { tx: Some(tx) }))
    }

    async fn get_device(&self, id: i64) -> StoreResult<Option<DeviceRecord>> {
        let entity = self.devices.find_by_id(id).await.map_err(map_sqlx_error)?;
        Ok(entity.map(Into::into))
    }

    async fn list_changes(
        &self,
        device_id: i64,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> StoreResult<Vec<ChangeRecord>> {
        let entities = self
            .changes
            .list_for_device(device_id, after, limit)
            .await
            .map_err(map_sqlx_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        let result = self.devices.ping().await.map_err(map_sqlx_error);
        record_pool_metrics(&self.pool);
        result
    }
}

/// One reconciliation unit on a pooled connection.
///
/// Dropping it without `commit` rolls the transaction back.
pub struct PgDeviceTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgDeviceTransaction {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl DeviceTransaction for PgDeviceTransaction {
    async fn lock_identities(&mut self, keys: &[IdentityKey]) -> StoreResult<()> {
        for key in keys {
            let lock_key = key.lock_key();
            DeviceRepository::lock_identity_key(self.conn()?, &lock_key)
                .await
                .map_err(map_sqlx_error)?;
            debug!(key = %lock_key, "Identity lock acquired");
        }
        Ok(())
    }

    async fn find_by_identity(
        &mut self,
        mac: Option<&str>,
        sn: Option<&str>,
    ) -> StoreResult<Option<DeviceRecord>> {
        let mac = mac.filter(|m| !m.is_empty());
        let sn = sn.filter(|s| !s.is_empty());
        if mac.is_none() && sn.is_none() {
            return Ok(None);
        }
        let entity = DeviceRepository::find_by_identity(self.conn()?, mac, sn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(entity.map(Into::into))
    }

    async fn lock_device(&mut self, id: i64) -> StoreResult<Option<DeviceRecord>> {
        let entity = DeviceRepository::lock_by_id(self.conn()?, id)
            .await
            .map_err(map_sqlx_error)?;
        debug!(device_id = id, found = entity.is_some(), "Device row locked");
        Ok(entity.map(Into::into))
    }

    async fn insert_device(
        &mut self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRecord> {
        let entity = DeviceRepository::insert(self.conn()?, fingerprint, now)
            .await
            .map_err(map_sqlx_error)?;
        Ok(entity.into())
    }

    async fn update_device(
        &mut self,
        id: i64,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let rows = DeviceRepository::update(self.conn()?, id, fingerprint, now)
            .await
            .map_err(map_sqlx_error)?;
        if rows == 0 {
            return Err(StoreError::DeviceNotFound(id));
        }
        Ok(())
    }

    async fn touch_last_reported(&mut self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        let rows = DeviceRepository::touch_last_reported(self.conn()?, id, now)
            .await
            .map_err(map_sqlx_error)?;
        if rows == 0 {
            return Err(StoreError::DeviceNotFound(id));
        }
        Ok(())
    }

    async fn append_change(&mut self, change: NewChangeRecord) -> StoreResult<ChangeRecord> {
        let entity = DeviceChangeRepository::append(self.conn()?, &change)
            .await
            .map_err(map_sqlx_error)?;
        Ok(entity.into())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await.map_err(map_sqlx_error)
    }
}

/// Maps a sqlx error onto the domain's storage error.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            if code == UNIQUE_VIOLATION {
                StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            } else if is_transient_sqlstate(&code) {
                StoreError::Unavailable(db_err.to_string())
            } else {
                StoreError::Backend(db_err.to_string())
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

/// SQLSTATE classes that mean "try again": connection exceptions (08),
/// transaction rollbacks such as serialization failures and deadlocks (40),
/// insufficient resources (53), operator intervention (57), and lock not
/// available (55P03).
fn is_transient_sqlstate(code: &str) -> bool {
    ["08", "40", "53", "57"]
        .iter()
        .any(|class| code.starts_with(class))
        || code == "55P03"
}
