//! Device repository for database operations.
//!
//! Reads that serve the HTTP layer go through the pool. Everything the
//! reconciler does runs on the connection of an open transaction, so those
//! functions take `&mut PgConnection` instead of `&self`.

use chrono::{DateTime, Utc};
use domain::models::Fingerprint;
use sqlx::{PgConnection, PgPool};

use crate::entities::DeviceEntity;
use crate::metrics::timed;

/// Repository for device-related database operations.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a device by its id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<DeviceEntity>, sqlx::Error> {
        timed(
            "find_device_by_id",
            sqlx::query_as::<_, DeviceEntity>(
                r#"
                SELECT id, name, cpu, ram, disk, sn, mac, ip, up_ver, comment, network,
                       last_reported_at, created_at, updated_at
                FROM devices
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    /// Round-trip to the database.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Take a transaction-scoped advisory lock on an identity key.
    ///
    /// Released automatically at commit or rollback.
    pub async fn lock_identity_key(conn: &mut PgConnection, key: &str) -> Result<(), sqlx::Error> {
        timed(
            "lock_identity_key",
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(key)
                .execute(conn),
        )
        .await
        .map(|_| ())
    }

    /// Find the lowest-id device owning the given non-empty MAC or serial.
    pub async fn find_by_identity(
        conn: &mut PgConnection,
        mac: Option<&str>,
        sn: Option<&str>,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        timed(
            "find_device_by_identity",
            sqlx::query_as::<_, DeviceEntity>(
                r#"
                SELECT id, name, cpu, ram, disk, sn, mac, ip, up_ver, comment, network,
                       last_reported_at, created_at, updated_at
                FROM devices
                WHERE ($1::text IS NOT NULL AND mac <> '' AND mac = $1)
                   OR ($2::text IS NOT NULL AND sn <> '' AND sn = $2)
                ORDER BY id ASC
                LIMIT 1
                "#,
            )
            .bind(mac)
            .bind(sn)
            .fetch_optional(conn),
        )
        .await
    }

    /// Lock a device row until the transaction ends.
    ///
    /// Waits for any transaction already holding it, then reads the row as
    /// that transaction left it.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        timed(
            "lock_device_by_id",
            sqlx::query_as::<_, DeviceEntity>(
                r#"
                SELECT id, name, cpu, ram, disk, sn, mac, ip, up_ver, comment, network,
                       last_reported_at, created_at, updated_at
                FROM devices
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(id)
            .fetch_optional(conn),
        )
        .await
    }

    /// Insert a new device. Returns the stored row.
    pub async fn insert(
        conn: &mut PgConnection,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<DeviceEntity, sqlx::Error> {
        timed(
            "insert_device",
            sqlx::query_as::<_, DeviceEntity>(
                r#"
                INSERT INTO devices (name, cpu, ram, disk, sn, mac, ip, up_ver, comment, network,
                                     last_reported_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, NULL)
                RETURNING id, name, cpu, ram, disk, sn, mac, ip, up_ver, comment, network,
                          last_reported_at, created_at, updated_at
                "#,
            )
            .bind(&fingerprint.name)
            .bind(&fingerprint.cpu)
            .bind(&fingerprint.ram)
            .bind(&fingerprint.disk)
            .bind(&fingerprint.sn)
            .bind(&fingerprint.mac)
            .bind(&fingerprint.ip)
            .bind(&fingerprint.up_ver)
            .bind(&fingerprint.comment)
            .bind(fingerprint.network.as_deref())
            .bind(now)
            .fetch_one(conn),
        )
        .await
    }

    /// Overwrite every tracked field of a device.
    /// Returns the number of rows affected (0 if the device does not exist).
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = timed(
            "update_device",
            sqlx::query(
                r#"
                UPDATE devices
                SET name = $2, cpu = $3, ram = $4, disk = $5, sn = $6, mac = $7, ip = $8,
                    up_ver = $9, comment = $10, network = $11,
                    updated_at = $12, last_reported_at = $12
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&fingerprint.name)
            .bind(&fingerprint.cpu)
            .bind(&fingerprint.ram)
            .bind(&fingerprint.disk)
            .bind(&fingerprint.sn)
            .bind(&fingerprint.mac)
            .bind(&fingerprint.ip)
            .bind(&fingerprint.up_ver)
            .bind(&fingerprint.comment)
            .bind(fingerprint.network.as_deref())
            .bind(now)
            .execute(conn),
        )
        .await?;
        Ok(result.rows_affected())
    }

    /// Record that a device reported without changes.
    /// Returns the number of rows affected (0 if the device does not exist).
    pub async fn touch_last_reported(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = timed(
            "touch_device_last_reported",
            sqlx::query(
                r#"
                UPDATE devices
                SET last_reported_at = $2
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(now)
            .execute(conn),
        )
        .await?;
        Ok(result.rows_affected())
    }
}
