//! OCR scan normalization
//!
//! The OCR capability returns untrusted free text. Serial numbers are
//! recognized as fixed-length alphanumeric runs containing at least one
//! digit; the amount is the largest plausible denomination-looking number
//! in the text. The product code comes from the scan station selection,
//! not from the text.

use uuid::Uuid;

use super::{parse_amount, NormalizeError};
use crate::models::{SourceChannel, VoucherRecord};

/// Serial length expected by the default voucher templates. The validator
/// re-checks against the configured length; extraction just needs a
/// plausible window.
pub const SERIAL_LENGTH: usize = 16;

/// Smallest amount treated as a denomination rather than scan noise
const MIN_PLAUSIBLE_AMOUNT: i64 = 100;

pub fn normalize(
    text: &str,
    product_code: &str,
    confidence: f64,
    batch_id: Uuid,
) -> Result<VoucherRecord, NormalizeError> {
    if product_code.trim().is_empty() {
        return Err(NormalizeError::MissingField("product_code"));
    }

    let serial_number = extract_serial(text, SERIAL_LENGTH).ok_or(NormalizeError::SerialNotFound)?;
    let denomination = extract_amount(text).ok_or(NormalizeError::AmountNotFound)?;

    Ok(VoucherRecord::new(
        serial_number,
        denomination,
        product_code.trim().to_string(),
        SourceChannel::Ocr,
        text.to_string(),
        Some(confidence),
        batch_id,
    ))
}

/// Find the first alphanumeric run of exactly `length` characters that
/// contains at least one digit (pure-alpha runs are words, not serials)
pub fn extract_serial(text: &str, length: usize) -> Option<String> {
    for run in alphanumeric_runs(text) {
        if run.len() == length && run.chars().any(|c| c.is_ascii_digit()) {
            return Some(run.to_ascii_uppercase());
        }
    }
    None
}

/// Pick the amount from scanned text
///
/// Collects digit groups (with `.`/`,` thousand separators) and returns
/// the largest value at or above the plausibility floor. Largest wins:
/// scans also pick up quantities and dates, which read smaller than any
/// denomination.
pub fn extract_amount(text: &str) -> Option<i64> {
    let mut best: Option<i64> = None;
    for token in text.split(|c: char| c.is_whitespace() || c == ':' || c == '=') {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        if !token.chars().next().map_or(false, |c| c.is_ascii_digit()) {
            continue;
        }
        // Skip serial-like runs: long and mixed with letters
        if token.chars().any(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        if let Ok(amount) = parse_amount(token) {
            if amount >= MIN_PLAUSIBLE_AMOUNT && best.map_or(true, |b| amount > b) {
                best = Some(amount);
            }
        }
    }
    best
}

fn alphanumeric_runs(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| !run.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_is_extracted_from_noise() {
        let text = "VOUCHER FISIK\nSN: AB12CD34EF56GH78\nRp 50.000";
        assert_eq!(extract_serial(text, 16).as_deref(), Some("AB12CD34EF56GH78"));
    }

    #[test]
    fn pure_alpha_runs_are_not_serials() {
        let text = "TELEKOMUNIKASISEL nothing here";
        assert_eq!(extract_serial(text, 16), None);
    }

    #[test]
    fn amount_prefers_the_denomination() {
        // "2" (quantity) and "50.000" both appear; the denomination wins
        let text = "2 pcs Rp 50.000 SN AB12CD34EF56GH78";
        assert_eq!(extract_amount(text), Some(50000));
    }

    #[test]
    fn normalized_record_carries_confidence() {
        let text = "SN AB12CD34EF56GH78 Rp 50.000";
        let record = normalize(text, "TSEL50", 0.82, Uuid::new_v4()).unwrap();
        assert_eq!(record.confidence, Some(0.82));
        assert_eq!(record.denomination, 50000);
        assert_eq!(record.raw_payload, text);
    }

    #[test]
    fn unreadable_scan_fails_locally() {
        let err = normalize("smudged text", "TSEL50", 0.4, Uuid::new_v4()).unwrap_err();
        assert_eq!(err, NormalizeError::SerialNotFound);
    }
}
