//! Pool setup and schema migrations.

use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Pool sizing and timeouts, mapped from the `[database]` config section.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Pool options without the URL.
    ///
    /// A reconciliation holds its connection across lock waits, so
    /// `max_connections` bounds how many reports are in flight at once.
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Connects the pool, failing if no connection comes up within the
/// acquire timeout.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to database"
    );
    config.pool_options().connect(&config.url).await
}

/// Brings the `devices` and `device_changes` schema up to date.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let migrator = sqlx::migrate!("./src/migrations");
    info!(available = migrator.iter().count(), "Running database migrations");
    migrator.run(pool).await?;
    info!("Migrations completed");
    Ok(())
}
