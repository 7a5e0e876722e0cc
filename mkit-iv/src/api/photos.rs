//! Photo search API handlers (read-only passthrough)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::PhotoRef;
use crate::AppState;

pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/records/:serial_number/photos", get(record_photos))
        .route("/batches/:batch_id/photos", get(batch_photos))
}

/// GET /records/{serial}/photos
pub async fn record_photos(
    State(state): State<AppState>,
    Path(serial_number): Path<String>,
) -> ApiResult<Json<Vec<PhotoRef>>> {
    let client = state
        .photos
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("photo service not configured".to_string()))?;

    let photos = client
        .by_serial(&serial_number)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(photos))
}

/// GET /batches/{id}/photos
pub async fn batch_photos(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PhotoRef>>> {
    let client = state
        .photos
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("photo service not configured".to_string()))?;

    let photos = client
        .by_batch(batch_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(photos))
}
