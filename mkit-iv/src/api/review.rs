//! Batch review API handlers

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{BatchReport, VoucherRecord};
use crate::AppState;

/// POST /batches/{id}/confirm request
///
/// Omitting `serial_numbers` confirms every staged record of the batch.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub serial_numbers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub batch_id: Uuid,
    pub confirmed: Vec<String>,
}

/// POST /batches/{id}/reject request
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub serial_numbers: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RejectResponse {
    pub batch_id: Uuid,
    pub rejected: Vec<String>,
}

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/batches/:batch_id", get(batch_report))
        .route("/batches/:batch_id/records", get(batch_records))
        .route("/batches/:batch_id/confirm", post(confirm))
        .route("/batches/:batch_id/reject", post(reject))
        .route("/records/:serial_number", delete(purge_record))
}

/// GET /batches/{id} - review status plus per-status counts
pub async fn batch_report(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<BatchReport>> {
    let report = state.review.report(batch_id).await?;
    Ok(Json(report))
}

/// GET /batches/{id}/records - all records for the preview screen
pub async fn batch_records(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<Vec<VoucherRecord>>> {
    let records = state.review.records(batch_id).await?;
    Ok(Json(records))
}

/// POST /batches/{id}/confirm - staged → previewed
pub async fn confirm(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    let confirmed = match request.serial_numbers {
        Some(serials) => {
            let mut confirmed = Vec::with_capacity(serials.len());
            for serial in serials {
                state.review.confirm(batch_id, &serial).await?;
                confirmed.push(serial);
            }
            confirmed
        }
        None => state.review.confirm_all(batch_id).await?,
    };

    Ok(Json(ConfirmResponse { batch_id, confirmed }))
}

/// DELETE /records/{serial} - purge a terminal record
///
/// Only committed or abandoned-rejected records past the retention
/// window are removable; anything still in flight is left untouched.
pub async fn purge_record(
    State(state): State<AppState>,
    Path(serial_number): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let purged = state
        .store
        .purge(&serial_number, state.purge_retention_days)
        .await?;
    if !purged {
        return Err(ApiError::Conflict(format!(
            "record {} is not purgeable (active, or inside the retention window)",
            serial_number
        )));
    }
    Ok(Json(serde_json::json!({ "purged": serial_number })))
}

/// POST /batches/{id}/reject - staged → rejected with reason
pub async fn reject(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<Json<RejectResponse>> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("rejection reason must not be empty".to_string()));
    }

    let mut rejected = Vec::with_capacity(request.serial_numbers.len());
    for serial in request.serial_numbers {
        state.review.reject(batch_id, &serial, &request.reason).await?;
        rejected.push(serial);
    }

    Ok(Json(RejectResponse { batch_id, rejected }))
}
