//! Manual form entry normalization
//!
//! Fields arrive named; only type coercion of the amount is needed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{canonical_serial, parse_amount, NormalizeError};
use crate::models::{SourceChannel, VoucherRecord};

/// Named fields of a manual entry form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFields {
    pub serial_number: String,
    /// As typed by the operator; coerced to an integer amount
    pub denomination: String,
    pub product_code: String,
    #[serde(default)]
    pub voucher_number: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

pub fn normalize(fields: &FormFields, batch_id: Uuid) -> Result<VoucherRecord, NormalizeError> {
    if fields.serial_number.trim().is_empty() {
        return Err(NormalizeError::MissingField("serial_number"));
    }
    if fields.product_code.trim().is_empty() {
        return Err(NormalizeError::MissingField("product_code"));
    }

    let denomination = parse_amount(&fields.denomination)?;
    let raw_payload = serde_json::to_string(fields)
        .map_err(|e| NormalizeError::MalformedRow(e.to_string()))?;

    let mut record = VoucherRecord::new(
        canonical_serial(&fields.serial_number),
        denomination,
        fields.product_code.trim().to_string(),
        SourceChannel::Form,
        raw_payload,
        None,
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
