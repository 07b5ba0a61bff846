//! Device change repository.
//!
//! The table is append-only; there is no update or delete here and the
//! database rejects both with a trigger.

use chrono::{DateTime, Utc};
use domain::models::NewChangeRecord;
use sqlx::{PgConnection, PgPool};

use crate::entities::{ChangeTypeDb, DeviceChangeEntity};
use crate::metrics::timed;

/// Repository for device change history.
#[derive(Clone)]
pub struct DeviceChangeRepository {
    pool: PgPool,
}

impl DeviceChangeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List a device's changes in `(changed_at, id)` order, strictly after
    /// the given position when one is supplied.
    pub async fn list_for_device(
        &self,
        device_id: i64,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<Vec<DeviceChangeEntity>, sqlx::Error> {
        let (after_time, after_id) = after.unzip();
        timed(
            "list_device_changes",
            sqlx::query_as::<_, DeviceChangeEntity>(
                r#"
                SELECT id, device_id, change_type, name, cpu, ram, disk, sn, mac, ip, up_ver,
                       comment, network, changed_at
                FROM device_changes
                WHERE device_id = $1
                  AND ($2::timestamptz IS NULL OR (changed_at, id) > ($2, $3))
                ORDER BY changed_at ASC, id ASC
                LIMIT $4
                "#,
            )
            .bind(device_id)
            .bind(after_time)
            .bind(after_id)
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Append a change record on the caller's transaction.
    pub async fn append(
        conn: &mut PgConnection,
        change: &NewChangeRecord,
    ) -> Result<DeviceChangeEntity, sqlx::Error> {
        let snapshot = &change.snapshot;
        timed(
            "append_device_change",
            sqlx::query_as::<_, DeviceChangeEntity>(
                r#"
                INSERT INTO device_changes (device_id, change_type, name, cpu, ram, disk, sn, mac,
                                            ip, up_ver, comment, network, changed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id, device_id, change_type, name, cpu, ram, disk, sn, mac, ip, up_ver,
                          comment, network, changed_at
                "#,
            )
            .bind(change.device_id)
            .bind(ChangeTypeDb::from(change.change_type))
            .bind(&snapshot.name)
            .bind(&snapshot.cpu)
            .bind(&snapshot.ram)
            .bind(&snapshot.disk)
            .bind(&snapshot.sn)
            .bind(&snapshot.mac)
            .bind(&snapshot.ip)
            .bind(&snapshot.up_ver)
            .bind(&snapshot.comment)
            .bind(snapshot.network.as_deref())
            .bind(change.changed_at)
            .fetch_one(conn),
        )
        .await
    }
}
