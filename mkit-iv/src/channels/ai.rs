//! AI photo parsing normalization
//!
//! The AI capability returns field-per-key output that is already
//! structured; only type coercion is applied here. Output is untrusted
//! and goes through full validation like every other channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{canonical_serial, parse_amount, NormalizeError};
use crate::models::{SourceChannel, VoucherRecord};

/// Structured fields extracted by the AI model
///
/// `denomination` is kept loose because models return either a JSON
/// number or a formatted string ("Rp 50.000").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFields {
    pub serial_number: String,
    pub denomination: Value,
    pub product_code: String,
    #[serde(default)]
    pub voucher_number: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

pub fn normalize(
    fields: &AiFields,
    confidence: f64,
    batch_id: Uuid,
) -> Result<VoucherRecord, NormalizeError> {
    if fields.serial_number.trim().is_empty() {
        return Err(NormalizeError::MissingField("serial_number"));
    }
    if fields.product_code.trim().is_empty() {
        return Err(NormalizeError::MissingField("product_code"));
    }

    let denomination = coerce_amount(&fields.denomination)?;
    let raw_payload = serde_json::to_string(fields)
        .map_err(|e| NormalizeError::MalformedRow(e.to_string()))?;

    let mut record = VoucherRecord::new(
        canonical_serial(&fields.serial_number),
        denomination,
        fields.product_code.trim().to_string(),
        SourceChannel::Ai,
        raw_payload,
        Some(confidence),
        batch_id,
    );
    record.voucher_number = fields
        .voucher_number
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    record.expiry_date = fields
        .expiry_date
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    Ok(record)
}

fn coerce_amount(value: &Value) -> Result<i64, NormalizeError> {
    match value {
        Value::Number(n) => {
            let amount = n
                .as_i64()
                .ok_or_else(|| NormalizeError::UnparseableAmount(n.to_string()))?;
            if amount <= 0 {
                return Err(NormalizeError::UnparseableAmount(n.to_string()));
            }
            Ok(amount)
        }
        Value::String(s) => parse_amount(s),
        other => Err(NormalizeError::UnparseableAmount(other.to_string())),
    }
}
