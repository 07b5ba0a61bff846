use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::Reconciler;
use domain::store::DeviceStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{devices, fingerprints, health};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DeviceStore>,
    pub reconciler: Reconciler,
    pub config: Arc<Config>,
}

pub fn create_app(config: Config, store: Arc<dyn DeviceStore>) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        reconciler: Reconciler::new(store.clone(), config.reconciler.max_conflict_retries),
        store,
        config: config.clone(),
    };

    // Collectors are not browsers; any origin may read the JSON endpoints.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    // Probes and scraping
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .layer(timeout.clone());

    // Fingerprint intake. `/api/client` is the path deployed clients post to.
    // No timeout: a report that is committing must get its real answer.
    let report_routes = Router::new()
        .route("/api/client", post(fingerprints::submit_fingerprint))
        .route("/api/v1/fingerprints", post(fingerprints::submit_fingerprint))
        .layer(DefaultBodyLimit::max(config.server.max_body_size));

    let device_routes = Router::new()
        .route("/api/v1/devices/:device_id", get(devices::get_device))
        .route(
            "/api/v1/devices/:device_id/changes",
            get(devices::list_device_changes),
        )
        .layer(timeout);

    Router::new()
        .merge(public_routes)
        .merge(report_routes)
        .merge(device_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
