//! Fingerprint submission endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use domain::models::{Fingerprint, SubmitFingerprintRequest, SubmitFingerprintResponse};
use tracing::Instrument;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::record_fingerprint_reconciled;

/// Submit a hardware fingerprint.
///
/// POST /api/client
/// POST /api/v1/fingerprints
///
/// Every accepted report answers 200 with the outcome (`insert`, `update` or
/// `nochange`) and the matched device id. The reconciliation runs on its own
/// task, so a client that disconnects mid-commit cannot cut it short.
pub async fn submit_fingerprint(
    State(state): State<AppState>,
    payload: Result<Json<SubmitFingerprintRequest>, JsonRejection>,
) -> Result<Json<SubmitFingerprintResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let reconciler = state.reconciler.clone();
    let fingerprint = Fingerprint::from(request);
    let reconciliation =
        tokio::spawn(async move { reconciler.reconcile(fingerprint).await }.in_current_span())
            .await
            .map_err(|err| ApiError::Internal(format!("reconciliation task failed: {err}")))??;
    record_fingerprint_reconciled(reconciliation.outcome);

    Ok(Json(reconciliation.into()))
}
