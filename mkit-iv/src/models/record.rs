//! Voucher record lifecycle state machine
//!
//! Every record moves monotonically along
//! INGESTED → NORMALIZED → VALIDATED → STAGED → PREVIEWED → COMMITTED,
//! with REJECTED reachable from NORMALIZED and STAGED, and COMMIT_FAILED
//! reachable from PREVIEWED. The only backward edge is the manual retry
//! COMMIT_FAILED → STAGED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input channel a record arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    Csv,
    Form,
    Ocr,
    Ai,
}

impl SourceChannel {
    /// Machine-read channels produce a confidence score; deterministic
    /// channels (CSV, form) never do.
    pub fn is_machine_read(self) -> bool {
        matches!(self, SourceChannel::Ocr | SourceChannel::Ai)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceChannel::Csv => "csv",
            SourceChannel::Form => "form",
            SourceChannel::Ocr => "ocr",
            SourceChannel::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(SourceChannel::Csv),
            "form" => Some(SourceChannel::Form),
            "ocr" => Some(SourceChannel::Ocr),
            "ai" => Some(SourceChannel::Ai),
            _ => None,
        }
    }
}

/// Record lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ingested,
    Normalized,
    Validated,
    Rejected,
    Staged,
    Previewed,
    Committed,
    CommitFailed,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Ingested => "ingested",
            RecordStatus::Normalized => "normalized",
            RecordStatus::Validated => "validated",
            RecordStatus::Rejected => "rejected",
            RecordStatus::Staged => "staged",
            RecordStatus::Previewed => "previewed",
            RecordStatus::Committed => "committed",
            RecordStatus::CommitFailed => "commit_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingested" => Some(RecordStatus::Ingested),
            "normalized" => Some(RecordStatus::Normalized),
            "validated" => Some(RecordStatus::Validated),
            "rejected" => Some(RecordStatus::Rejected),
            "staged" => Some(RecordStatus::Staged),
            "previewed" => Some(RecordStatus::Previewed),
            "committed" => Some(RecordStatus::Committed),
            "commit_failed" => Some(RecordStatus::CommitFailed),
            _ => None,
        }
    }

    /// Whether a transition from `self` to `to` is legal
    pub fn can_transition_to(self, to: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, to),
            (Ingested, Normalized)
                | (Normalized, Validated)
                | (Normalized, Rejected)
                | (Validated, Staged)
                | (Staged, Previewed)
                | (Staged, Rejected)
                | (Previewed, Committed)
                | (Previewed, CommitFailed)
                | (CommitFailed, Staged)
        )
    }

    /// Terminal statuses never transition again and are eligible for purge
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Committed | RecordStatus::Rejected)
    }
}

/// Status transition event, logged on every state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub serial_number: String,
    pub old_status: RecordStatus,
    pub new_status: RecordStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Canonical voucher record flowing through the intake pipeline
///
/// All four input channels converge on this shape; everything downstream
/// of the normalizer is channel-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherRecord {
    /// Stable identity of this staging entry. Distinct from the serial
    /// number: a corrected resubmission after rejection is a new entity.
    pub record_id: Uuid,

    /// Serial number printed/encoded on the physical voucher. Business
    /// key; unique among non-rejected records in staging.
    pub serial_number: String,

    /// Printed voucher number, when the channel supplies one
    pub voucher_number: Option<String>,

    /// Printed expiry date, kept verbatim as entered
    pub expiry_date: Option<String>,

    /// Face value in smallest currency unit
    pub denomination: i64,

    /// Voucher product / operator identifier
    pub product_code: String,

    /// Channel this record arrived through
    pub source_channel: SourceChannel,

    /// Original input (CSV line, form JSON, OCR text, AI payload) kept
    /// for audit
    pub raw_payload: String,

    /// Extraction confidence in [0,1]. Present iff the channel is
    /// machine-read (OCR/AI); absent, not zero, for CSV and form.
    pub confidence: Option<f64>,

    pub status: RecordStatus,

    /// Set only when status is `rejected` or `commit_failed`
    pub rejection_reason: Option<String>,

    /// Batch this record was submitted under. Never changes after creation.
    pub batch_id: Uuid,

    /// External commit attempts so far; used to decide whether a commit
    /// must check the core before writing (lost-acknowledgment retry)
    pub commit_attempts: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoucherRecord {
    /// Create a freshly ingested record
    pub fn new(
        serial_number: String,
        denomination: i64,
        product_code: String,
        source_channel: SourceChannel,
        raw_payload: String,
        confidence: Option<f64>,
        batch_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            record_id: Uuid::new_v4(),
            serial_number,
            voucher_number: None,
            expiry_date: None,
            denomination,
            product_code,
            source_channel,
            raw_payload,
            confidence,
            status: RecordStatus::Ingested,
            rejection_reason: None,
            batch_id,
            commit_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, enforcing the state machine
    ///
    /// Returns the transition on success, `None` when the edge is illegal.
    pub fn transition_to(&mut self, new_status: RecordStatus) -> Option<StatusTransition> {
        if !self.status.can_transition_to(new_status) {
            return None;
        }
        let transition = StatusTransition {
            serial_number: self.serial_number.clone(),
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        self.updated_at = transition.transitioned_at;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_is_legal() {
        use RecordStatus::*;
        let mut record = VoucherRecord::new(
            "AAAA111122223333".to_string(),
            10000,
            "TSEL10".to_string(),
            SourceChannel::Form,
            "{}".to_string(),
            None,
            Uuid::new_v4(),
        );
        for status in [Normalized, Validated, Staged, Previewed, Committed] {
            assert!(record.transition_to(status).is_some(), "{:?} must be reachable", status);
        }
        assert_eq!(record.status, Committed);
    }

    #[test]
    fn no_regression_except_commit_retry() {
        use RecordStatus::*;
        assert!(!Committed.can_transition_to(Previewed));
        assert!(!Previewed.can_transition_to(Staged));
        assert!(!Staged.can_transition_to(Validated));
        assert!(CommitFailed.can_transition_to(Staged));
    }

    #[test]
    fn rejected_is_terminal() {
        use RecordStatus::*;
        for status in [
            Ingested, Normalized, Validated, Staged, Previewed, Committed, CommitFailed,
        ] {
            assert!(!Rejected.can_transition_to(status));
        }
        assert!(Rejected.is_terminal());
    }

    #[test]
    fn status_round_trips_through_text() {
        use RecordStatus::*;
        for status in [
            Ingested, Normalized, Validated, Rejected, Staged, Previewed, Committed, CommitFailed,
        ] {
            assert_eq!(RecordStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RecordStatus::parse("unknown"), None);
    }
}
