//! Record validation
//!
//! Checks run in a fixed order so rejection reasons are reproducible:
//! structural → format → staging-duplicate → upstream verification.
//! The first failing check rejects the record; later checks are not
//! attempted. Only the last two checks touch shared state or the
//! network; the rest are pure and run fully in parallel across records.

use std::sync::Arc;
use thiserror::Error;

use mkit_common::config::RulesConfig;

use crate::models::{RecordStatus, VoucherRecord};
use crate::services::{SerialVerifier, VerificationStatus, VerifierError};
use crate::staging::StagingStore;

/// Why a record failed validation
///
/// The Display string becomes the record's `rejection_reason`; each
/// variant names the check that failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("structural: {0}")]
    Structural(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("duplicate serial in staging: {0}")]
    DuplicateSerial(String),

    #[error("serial already used upstream: {0}")]
    AlreadyUsedUpstream(String),

    /// Upstream verification could not answer (timeout/unreachable).
    /// Distinguishable from a permanent rejection so the operator knows
    /// a resubmission may succeed.
    #[error("verification unavailable: {0}")]
    VerificationUnavailable(String),
}

/// Outcome of validating one record
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(ValidationError),
}

/// Validation pipeline over a normalized record
pub struct Validator {
    rules: RulesConfig,
    store: StagingStore,
    verifier: Option<Arc<dyn SerialVerifier>>,
}

impl Validator {
    pub fn new(
        rules: RulesConfig,
        store: StagingStore,
        verifier: Option<Arc<dyn SerialVerifier>>,
    ) -> Self {
        Self { rules, store, verifier }
    }

    /// Run all checks against a `normalized` record
    ///
    /// On acceptance the record transitions to `validated`. A rejection
    /// outcome leaves the record in `normalized`; the caller persists the
    /// rejection. Database failures during the duplicate check surface as
    /// errors, not rejections.
    pub async fn validate(
        &self,
        record: &mut VoucherRecord,
    ) -> mkit_common::Result<ValidationOutcome> {
        debug_assert_eq!(record.status, RecordStatus::Normalized);

        if let Err(e) = self.check_structural(record) {
            return Ok(ValidationOutcome::Rejected(e));
        }
        if let Err(e) = self.check_format(record) {
            return Ok(ValidationOutcome::Rejected(e));
        }
        if let Err(e) = self.check_duplicate(record).await? {
            return Ok(ValidationOutcome::Rejected(e));
        }
        if let Err(e) = self.check_upstream(record).await {
            return Ok(ValidationOutcome::Rejected(e));
        }

        record.transition_to(RecordStatus::Validated);
        Ok(ValidationOutcome::Accepted)
    }

    /// (a) Required fields present, types coherent with the channel
    fn check_structural(&self, record: &VoucherRecord) -> Result<(), ValidationError> {
        if record.serial_number.is_empty() {
            return Err(ValidationError::Structural("serial_number is empty".to_string()));
        }
        if record.product_code.is_empty() {
            return Err(ValidationError::Structural("product_code is empty".to_string()));
        }
        if record.denomination <= 0 {
            return Err(ValidationError::Structural(format!(
                "denomination {} is not positive",
                record.denomination
            )));
        }

        // Confidence is present iff the channel is machine-read
        match (record.source_channel.is_machine_read(), record.confidence) {
            (true, None) => {
                return Err(ValidationError::Structural(format!(
                    "{} record is missing a confidence score",
                    record.source_channel.as_str()
                )));
            }
            (false, Some(_)) => {
                return Err(ValidationError::Structural(format!(
                    "{} record must not carry a confidence score",
                    record.source_channel.as_str()
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// (b) Serial pattern and denomination range
    fn check_format(&self, record: &VoucherRecord) -> Result<(), ValidationError> {
        let serial = &record.serial_number;
        if serial.len() != self.rules.serial_length {
            return Err(ValidationError::InvalidFormat(format!(
                "serial length {} (expected {})",
                serial.len(),
                self.rules.serial_length
            )));
        }
        if !serial.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidFormat(
                "serial contains non-alphanumeric characters".to_string(),
            ));
        }

        if !self.rules.allowed_denominations.is_empty()
            && !self.rules.allowed_denominations.contains(&record.denomination)
        {
            return Err(ValidationError::InvalidFormat(format!(
                "denomination {} not in allowed set",
                record.denomination
            )));
        }
        Ok(())
    }

    /// (c) Advisory duplicate check against staging
    ///
    /// Advisory only: the staging store's insert is the authoritative
    /// gate. This check exists to reject obvious duplicates before the
    /// slower upstream verification runs.
    async fn check_duplicate(
        &self,
        record: &VoucherRecord,
    ) -> mkit_common::Result<Result<(), ValidationError>> {
        let exists = self
            .store
            .active_exists(&record.serial_number)
            .await
            .map_err(|e| mkit_common::Error::Internal(e.to_string()))?;
        if exists {
            return Ok(Err(ValidationError::DuplicateSerial(record.serial_number.clone())));
        }
        Ok(Ok(()))
    }

    /// (d) Optional upstream verification (Otoplus)
    ///
    /// `used` rejects; `unused`/`unknown` pass (the core's own constraint
    /// is the final word). A timeout is a failure, not a pass.
    async fn check_upstream(&self, record: &VoucherRecord) -> Result<(), ValidationError> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };

        match verifier.verify(&record.serial_number).await {
            Ok(VerificationStatus::Used) => Err(ValidationError::AlreadyUsedUpstream(
                record.serial_number.clone(),
            )),
            Ok(VerificationStatus::Unused) | Ok(VerificationStatus::Unknown) => Ok(()),
            Err(VerifierError::Timeout(ms)) => Err(ValidationError::VerificationUnavailable(
                format!("timeout after {}ms", ms),
            )),
            Err(e) => Err(ValidationError::VerificationUnavailable(e.to_string())),
        }
    }
}
