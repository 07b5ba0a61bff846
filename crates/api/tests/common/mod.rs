//! Common test utilities for integration tests.
//!
//! The app is driven in-process over the in-memory device store, so these
//! tests need no database.

// Not every integration test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use domain::store::InMemoryDeviceStore;
use inventory_api::{
    app::create_app,
    config::{Config, DatabaseConfig, LoggingConfig, ReconcilerConfig, ServerConfig},
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Test configuration; the database URL is never dialled.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
            max_body_size: 1_048_576,
        },
        database: DatabaseConfig {
            url: "postgres://unused@localhost/unused".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
            dir: None,
        },
        reconciler: ReconcilerConfig {
            max_conflict_retries: 3,
        },
    }
}

/// Create a test application router together with its backing store.
pub fn create_test_app(config: Config) -> (Router, InMemoryDeviceStore) {
    let store = InMemoryDeviceStore::new();
    let app = create_app(config, Arc::new(store.clone()));
    (app, store)
}

/// Build a JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a GET request.
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// A fingerprint in the shape deployed clients post it.
pub fn client_report(mac: &str, sn: &str) -> Value {
    json!({
        "Name": "lab-ws-01",
        "CPU": "Intel Core i7-8700",
        "RAM": "16GB",
        "Disk": "512GB SSD",
        "SN": sn,
        "MAC": mac,
        "IP": "192.168.1.20",
        "up_ver": "2.4.1",
        "comment": "",
        "Network": "eth0"
    })
}

/// Post a report to `/api/client` and return the parsed body.
pub async fn submit_report(app: &Router, report: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/client", report))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    parse_response_body(response).await
}
