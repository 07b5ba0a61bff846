//! Integration tests for the device read endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    client_report, create_test_app, get_request, parse_response_body, submit_report, test_config,
};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_get_device() {
    let (app, _store) = create_test_app(test_config());
    let submitted = submit_report(&app, client_report("AA:BB:CC:00:00:01", "DEV-0001")).await;
    let device_id = submitted["device_id"].as_i64().unwrap();

    let response = app
        .oneshot(get_request(&format!("/api/v1/devices/{}", device_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["id"], device_id);
    assert_eq!(body["mac"], "aabb.cc00.0001");
    assert_eq!(body["sn"], "DEV-0001");
    assert_eq!(body["network"], "eth0");
    assert!(body["last_reported_at"].is_string());
    assert!(body["updated_at"].is_null());
}

#[tokio::test]
async fn test_get_unknown_device() {
    let (app, _store) = create_test_app(test_config());

    let response = app
        .oneshot(get_request("/api/v1/devices/424242"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_get_device_with_non_numeric_id() {
    let (app, _store) = create_test_app(test_config());

    let response = app
        .oneshot(get_request("/api/v1/devices/abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_history_pagination() {
    let (app, _store) = create_test_app(test_config());
    let mut report = client_report("aa:bb:cc:00:00:02", "DEV-0002");
    let submitted = submit_report(&app, report.clone()).await;
    let device_id = submitted["device_id"].as_i64().unwrap();

    for octet in 2..5 {
        report["IP"] = json!(format!("10.0.0.{}", octet));
        let body = submit_report(&app, report.clone()).await;
        assert_eq!(body["result"], "update");
    }

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/v1/devices/{}/changes?limit=2",
            device_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first_page = parse_response_body(response).await;

    assert_eq!(first_page["device_id"], device_id);
    let changes = first_page["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["change_type"], "insert");
    assert_eq!(changes[1]["change_type"], "update");
    assert_eq!(changes[1]["ip"], "10.0.0.2");
    let cursor = first_page["next_cursor"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get_request(&format!(
            "/api/v1/devices/{}/changes?limit=2&cursor={}",
            device_id, cursor
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second_page = parse_response_body(response).await;

    let changes = second_page["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["ip"], "10.0.0.3");
    assert_eq!(changes[1]["ip"], "10.0.0.4");
    assert!(second_page.get("next_cursor").is_none());
}

#[tokio::test]
async fn test_change_history_default_limit_returns_everything() {
    let (app, _store) = create_test_app(test_config());
    let submitted = submit_report(&app, client_report("aa:bb:cc:00:00:03", "DEV-0003")).await;
    let device_id = submitted["device_id"].as_i64().unwrap();

    let response = app
        .oneshot(get_request(&format!("/api/v1/devices/{}/changes", device_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["changes"].as_array().unwrap().len(), 1);
    assert!(body.get("next_cursor").is_none());
}

#[tokio::test]
async fn test_change_history_rejects_bad_limit() {
    let (app, _store) = create_test_app(test_config());
    let submitted = submit_report(&app, client_report("aa:bb:cc:00:00:04", "DEV-0004")).await;
    let device_id = submitted["device_id"].as_i64().unwrap();

    for limit in ["0", "501", "-1"] {
        let response = app
            .clone()
            .oneshot(get_request(&format!(
                "/api/v1/devices/{}/changes?limit={}",
                device_id, limit
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "limit={}", limit);
    }
}

#[tokio::test]
async fn test_change_history_rejects_bad_cursor() {
    let (app, _store) = create_test_app(test_config());
    let submitted = submit_report(&app, client_report("aa:bb:cc:00:00:05", "DEV-0005")).await;
    let device_id = submitted["device_id"].as_i64().unwrap();

    let response = app
        .oneshot(get_request(&format!(
            "/api/v1/devices/{}/changes?cursor=not-a-cursor",
            device_id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_change_history_of_unknown_device() {
    let (app, _store) = create_test_app(test_config());

    let response = app
        .oneshot(get_request("/api/v1/devices/777/changes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
