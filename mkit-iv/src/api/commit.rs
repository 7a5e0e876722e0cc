//! Commit and retry API handlers

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::commit::CommitReport;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub serial_number: String,
    pub batch_id: Uuid,
}

pub fn commit_routes() -> Router<AppState> {
    Router::new()
        .route("/batches/:batch_id/commit", post(commit_batch))
        .route("/records/:serial_number/retry", post(retry_record))
}

/// POST /batches/{id}/commit - push previewed records into the core
pub async fn commit_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<CommitReport>> {
    let report = state.committer.commit_batch(batch_id).await?;
    Ok(Json(report))
}

/// POST /records/{serial}/retry - commit_failed → staged
pub async fn retry_record(
    State(state): State<AppState>,
    Path(serial_number): Path<String>,
) -> ApiResult<Json<RetryResponse>> {
    let batch_id = state.review.retry(&serial_number).await?;
    Ok(Json(RetryResponse { serial_number, batch_id }))
}
