//! Batch grouping for joint review and commit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::RecordStatus;

/// Review lifecycle of a batch, derived from its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// No record has been reviewed yet
    Pending,
    /// Some records reviewed, some still staged
    PartiallyReviewed,
    /// Every record has left staging (previewed or rejected)
    Confirmed,
    /// Bulk commit has run; no record remains previewed
    Committed,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::PartiallyReviewed => "partially_reviewed",
            ReviewStatus::Confirmed => "confirmed",
            ReviewStatus::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "partially_reviewed" => Some(ReviewStatus::PartiallyReviewed),
            "confirmed" => Some(ReviewStatus::Confirmed),
            "committed" => Some(ReviewStatus::Committed),
            _ => None,
        }
    }
}

/// A named grouping of records submitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: Uuid,
    /// Opaque operator identity (RBAC is layered on later, not here)
    pub submitted_by: String,
    pub record_count: i64,
    pub review_status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(submitted_by: String) -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            submitted_by,
            record_count: 0,
            review_status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-status record counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub staged: usize,
    pub previewed: usize,
    pub rejected: usize,
    pub committed: usize,
    pub commit_failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.staged + self.previewed + self.rejected + self.committed + self.commit_failed
    }

    pub fn add(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Staged => self.staged += 1,
            RecordStatus::Previewed => self.previewed += 1,
            RecordStatus::Rejected => self.rejected += 1,
            RecordStatus::Committed => self.committed += 1,
            RecordStatus::CommitFailed => self.commit_failed += 1,
            // Pre-staging statuses never persist, so they never count
            RecordStatus::Ingested | RecordStatus::Normalized | RecordStatus::Validated => {}
        }
    }

    /// Derive the batch review status from its record counts
    ///
    /// A batch is `confirmed` once every record has left `staged`, and
    /// `committed` once no record remains `previewed` after a commit run.
    pub fn derive_review_status(&self) -> ReviewStatus {
        if self.total() == 0 {
            return ReviewStatus::Pending;
        }
        if self.staged > 0 {
            let reviewed = self.total() - self.staged;
            if reviewed == 0 {
                return ReviewStatus::Pending;
            }
            return ReviewStatus::PartiallyReviewed;
        }
        if self.previewed > 0 {
            return ReviewStatus::Confirmed;
        }
        if self.committed > 0 || self.commit_failed > 0 {
            return ReviewStatus::Committed;
        }
        // Everything rejected during review
        ReviewStatus::Confirmed
    }
}

/// Batch-level report shown to the operator after each stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub submitted_by: String,
    pub review_status: ReviewStatus,
    pub counts: StatusCounts,
    pub created_at: DateTime<Utc>,
}
