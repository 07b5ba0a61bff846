use std::sync::Arc;

use anyhow::Result;
use inventory_api::{app, config, middleware};
use persistence::PgDeviceStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    let _log_guard = middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting inventory server v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&(&config.database).into()).await?;

    persistence::db::run_migrations(&pool).await?;

    let store = Arc::new(PgDeviceStore::new(pool));
    let addr = config.socket_addr()?;
    let app = app::create_app(config, store);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
