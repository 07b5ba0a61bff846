//! Device lookup and change history endpoints.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use domain::models::{ChangeHistoryResponse, DeviceResponse};
use serde::Deserialize;
use shared::pagination::{decode_cursor, encode_cursor};
use shared::validation::validate_page_limit;

use crate::app::AppState;
use crate::error::ApiError;

const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Query parameters for the change history listing.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeHistoryQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// Fetch the current record of a device.
///
/// GET /api/v1/devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let Path(device_id) = path?;

    let device = state
        .store
        .get_device(device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Device {} not found", device_id)))?;

    Ok(Json(device.into()))
}

/// List a device's change history, oldest first.
///
/// GET /api/v1/devices/:device_id/changes?limit=&cursor=
pub async fn list_device_changes(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<ChangeHistoryQuery>, QueryRejection>,
) -> Result<Json<ChangeHistoryResponse>, ApiError> {
    let Path(device_id) = path?;
    let Query(query) = query?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    validate_page_limit(limit).map_err(|e| {
        ApiError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid limit".to_string()),
        )
    })?;
    let after = query.cursor.as_deref().map(decode_cursor).transpose()?;

    if state.store.get_device(device_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Device {} not found",
            device_id
        )));
    }

    // One extra row tells whether another page exists.
    let mut changes = state
        .store
        .list_changes(device_id, after, limit + 1)
        .await?;

    let next_cursor = if changes.len() as i64 > limit {
        changes.truncate(limit as usize);
        changes
            .last()
            .map(|change| encode_cursor(change.changed_at, change.id))
    } else {
        None
    };

    Ok(Json(ChangeHistoryResponse {
        device_id,
        changes,
        next_cursor,
    }))
}
