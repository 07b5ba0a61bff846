//! Store-level metrics.
//!
//! Every repository query goes through [`timed`], which records
//! `database_query_duration_seconds{query, outcome}`. Lost insert races show
//! up as `outcome="unique_violation"`, so a burst of them is visible without
//! reading logs.

use std::future::Future;
use std::time::Instant;

use metrics::{gauge, histogram};
use sqlx::PgPool;

use crate::store::UNIQUE_VIOLATION;

/// Runs one query and records how long it took and how it ended.
pub async fn timed<T, F>(query: &'static str, run: F) -> Result<T, sqlx::Error>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    let start = Instant::now();
    let result = run.await;
    histogram!(
        "database_query_duration_seconds",
        "query" => query,
        "outcome" => outcome_label(&result)
    )
    .record(start.elapsed().as_secs_f64());
    result
}

fn outcome_label<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
        {
            "unique_violation"
        }
        Err(_) => "error",
    }
}

/// Publishes pool occupancy; refreshed on every health check.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections", "state" => "active").set(size.saturating_sub(idle) as f64);
    gauge!("database_connections", "state" => "idle").set(idle as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&Ok::<_, sqlx::Error>(())), "ok");
        assert_eq!(outcome_label::<()>(&Err(sqlx::Error::RowNotFound)), "error");
        assert_eq!(outcome_label::<()>(&Err(sqlx::Error::PoolTimedOut)), "error");
    }

    #[tokio::test]
    async fn test_timed_passes_result_through() {
        let value = timed("find_device_by_id", async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(value.unwrap(), 7);

        let err = timed::<(), _>("insert_device", async { Err(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(err, Err(sqlx::Error::RowNotFound)));
    }
}
