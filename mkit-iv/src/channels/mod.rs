//! Input channel normalization
//!
//! Four heterogeneous channels (CSV upload, manual form, OCR scan, AI
//! photo parsing) funnel into one canonical [`VoucherRecord`] shape.
//! Dispatch is a tagged variant per channel; everything downstream is
//! channel-agnostic. Normalization does no I/O.

pub mod ai;
pub mod csv;
pub mod form;
pub mod ocr;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{RecordStatus, SourceChannel, VoucherRecord};

pub use ai::AiFields;
pub use csv::ColumnMap;
pub use form::FormFields;

/// Normalization failure, local to a single record
///
/// A failed row never affects its siblings in the same upload.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("unparseable amount: {0:?}")]
    UnparseableAmount(String),

    #[error("no serial number found in scanned text")]
    SerialNotFound,

    #[error("no amount found in scanned text")]
    AmountNotFound,

    #[error("confidence {0} outside [0,1]")]
    ConfidenceOutOfRange(f64),
}

/// Raw input from one channel, tagged with its source
#[derive(Debug, Clone)]
pub enum ChannelInput {
    /// One data row of a CSV/TXT upload
    Csv {
        line: String,
        line_number: usize,
        columns: ColumnMap,
    },
    /// Manual form submission
    Form(FormFields),
    /// Free text produced by the OCR capability
    Ocr {
        text: String,
        product_code: String,
        confidence: f64,
    },
    /// Structured fields produced by the AI parsing capability
    Ai { fields: AiFields, confidence: f64 },
}

impl ChannelInput {
    pub fn source_channel(&self) -> SourceChannel {
        match self {
            ChannelInput::Csv { .. } => SourceChannel::Csv,
            ChannelInput::Form(_) => SourceChannel::Form,
            ChannelInput::Ocr { .. } => SourceChannel::Ocr,
            ChannelInput::Ai { .. } => SourceChannel::Ai,
        }
    }
}

/// Normalize raw channel input into a canonical record
///
/// On success the record is in `normalized` status with the original
/// input preserved in `raw_payload` for audit.
pub fn normalize(input: &ChannelInput, batch_id: Uuid) -> Result<VoucherRecord, NormalizeError> {
    let mut record = match input {
        ChannelInput::Csv { line, line_number, columns } => {
            csv::normalize_row(line, *line_number, columns, batch_id)?
        }
        ChannelInput::Form(fields) => form::normalize(fields, batch_id)?,
        ChannelInput::Ocr { text, product_code, confidence } => {
            check_confidence(*confidence)?;
            ocr::normalize(text, product_code, *confidence, batch_id)?
        }
        ChannelInput::Ai { fields, confidence } => {
            check_confidence(*confidence)?;
            ai::normalize(fields, *confidence, batch_id)?
        }
    };

    // Constructor starts at INGESTED; normalization is the first edge.
    record.transition_to(RecordStatus::Normalized);
    Ok(record)
}

fn check_confidence(confidence: f64) -> Result<(), NormalizeError> {
    if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
        return Err(NormalizeError::ConfidenceOutOfRange(confidence));
    }
    Ok(())
}

/// Parse a denomination amount from user-entered or scanned text
///
/// Accepts an optional `Rp` prefix and `.`/`,` thousand separators
/// ("Rp 50.000" → 50000). Amounts must be positive integers.
pub fn parse_amount(raw: &str) -> Result<i64, NormalizeError> {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("Rp")
        .or_else(|| trimmed.strip_prefix("rp"))
        .unwrap_or(trimmed)
        .trim();

    if without_prefix.is_empty() {
        return Err(NormalizeError::UnparseableAmount(raw.to_string()));
    }

    let mut digits = String::with_capacity(without_prefix.len());
    for c in without_prefix.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '.' | ',' | ' ' => {} // thousand separators
            _ => return Err(NormalizeError::UnparseableAmount(raw.to_string())),
        }
    }

    let amount: i64 = digits
        .parse()
        .map_err(|_| NormalizeError::UnparseableAmount(raw.to_string()))?;
    if amount <= 0 {
        return Err(NormalizeError::UnparseableAmount(raw.to_string()));
    }
    Ok(amount)
}

/// Uppercase and trim a serial number as printed on the voucher
pub(crate) fn canonical_serial(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_indonesian_separators() {
        assert_eq!(parse_amount("50000").unwrap(), 50000);
        assert_eq!(parse_amount("50.000").unwrap(), 50000);
        assert_eq!(parse_amount("Rp 100.000").unwrap(), 100000);
        assert_eq!(parse_amount("10,000").unwrap(), 10000);
    }

    #[test]
    fn amounts_reject_garbage() {
        assert!(matches!(parse_amount(""), Err(NormalizeError::UnparseableAmount(_))));
        assert!(matches!(parse_amount("abc"), Err(NormalizeError::UnparseableAmount(_))));
        assert!(matches!(parse_amount("0"), Err(NormalizeError::UnparseableAmount(_))));
        assert!(matches!(parse_amount("-500"), Err(NormalizeError::UnparseableAmount(_))));
    }

    #[test]
    fn confidence_bounds_are_enforced() {
        assert!(check_confidence(0.0).is_ok());
        assert!(check_confidence(1.0).is_ok());
        assert!(check_confidence(1.01).is_err());
        assert!(check_confidence(-0.1).is_err());
        assert!(check_confidence(f64::NAN).is_err());
    }
}
