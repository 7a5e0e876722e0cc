//! Intake API handlers
//!
//! One endpoint per input channel; each submission opens a new batch
//! and returns per-record outcomes plus the batch summary.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::channels::{csv, AiFields, ChannelInput, FormFields};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::IngestReport;
use crate::AppState;

/// POST /intake/csv request
#[derive(Debug, Deserialize)]
pub struct CsvIntakeRequest {
    pub submitted_by: String,
    /// Raw CSV/TXT upload content (template columns)
    pub payload: String,
}

/// POST /intake/form request
#[derive(Debug, Deserialize)]
pub struct FormIntakeRequest {
    pub submitted_by: String,
    #[serde(flatten)]
    pub fields: FormFields,
}

/// POST /intake/ocr request
#[derive(Debug, Deserialize)]
pub struct OcrIntakeRequest {
    pub submitted_by: String,
    /// Free text produced by the OCR engine
    pub text: String,
    /// Product selected at the scan station
    pub product_code: String,
    pub confidence: f64,
}

/// POST /intake/ai request
#[derive(Debug, Deserialize)]
pub struct AiIntakeRequest {
    pub submitted_by: String,
    pub fields: AiFields,
    pub confidence: f64,
}

pub fn intake_routes() -> Router<AppState> {
    Router::new()
        .route("/intake/csv", post(intake_csv))
        .route("/intake/form", post(intake_form))
        .route("/intake/ocr", post(intake_ocr))
        .route("/intake/ai", post(intake_ai))
}

/// POST /intake/csv - bulk upload
pub async fn intake_csv(
    State(state): State<AppState>,
    Json(request): Json<CsvIntakeRequest>,
) -> ApiResult<Json<IngestReport>> {
    require_operator(&request.submitted_by)?;

    let (columns, rows) = csv::split_upload(&request.payload);
    if rows.is_empty() {
        return Err(ApiError::BadRequest("upload contains no data rows".to_string()));
    }

    let inputs = rows
        .into_iter()
        .map(|(line_number, line)| ChannelInput::Csv {
            line,
            line_number,
            columns: columns.clone(),
        })
        .collect();

    let report = state.pipeline.ingest(inputs, &request.submitted_by).await?;
    Ok(Json(report))
}

/// POST /intake/form - manual entry
pub async fn intake_form(
    State(state): State<AppState>,
    Json(request): Json<FormIntakeRequest>,
) -> ApiResult<Json<IngestReport>> {
    require_operator(&request.submitted_by)?;

    let inputs = vec![ChannelInput::Form(request.fields)];
    let report = state.pipeline.ingest(inputs, &request.submitted_by).await?;
    Ok(Json(report))
}

/// POST /intake/ocr - scanned voucher text
pub async fn intake_ocr(
    State(state): State<AppState>,
    Json(request): Json<OcrIntakeRequest>,
) -> ApiResult<Json<IngestReport>> {
    require_operator(&request.submitted_by)?;

    let inputs = vec![ChannelInput::Ocr {
        text: request.text,
        product_code: request.product_code,
        confidence: request.confidence,
    }];
    let report = state.pipeline.ingest(inputs, &request.submitted_by).await?;
    Ok(Json(report))
}

/// POST /intake/ai - AI-parsed voucher photo
pub async fn intake_ai(
    State(state): State<AppState>,
    Json(request): Json<AiIntakeRequest>,
) -> ApiResult<Json<IngestReport>> {
    require_operator(&request.submitted_by)?;

    let inputs = vec![ChannelInput::Ai {
        fields: request.fields,
        confidence: request.confidence,
    }];
    let report = state.pipeline.ingest(inputs, &request.submitted_by).await?;
    Ok(Json(report))
}

fn require_operator(submitted_by: &str) -> ApiResult<()> {
    if submitted_by.trim().is_empty() {
        return Err(ApiError::BadRequest("submitted_by must not be empty".to_string()));
    }
    Ok(())
}
