//! Preview/review sessions
//!
//! Groups the staged records of a batch for operator confirmation. No
//! record reaches the committer without passing through `previewed`
//! here; the batch's review status is always derived from its records,
//! never tracked independently.

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use mkit_common::events::{EventBus, IntakeEvent};

use crate::db::batches;
use crate::models::{BatchReport, RecordStatus, ReviewStatus, VoucherRecord};
use crate::staging::{StagingError, StagingStore};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("batch not found: {0}")]
    BatchNotFound(Uuid),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Common(#[from] mkit_common::Error),
}

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;

/// Operator review over a batch of staged records
pub struct ReviewSession {
    store: StagingStore,
    events: EventBus,
}

impl ReviewSession {
    pub fn new(store: StagingStore, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Confirm a single record: `staged → previewed`
    pub async fn confirm(&self, batch_id: Uuid, serial_number: &str) -> ReviewResult<()> {
        self.store.mark_previewed(serial_number).await?;
        self.refresh_status(batch_id).await?;
        Ok(())
    }

    /// Reject a single record with a reason: `staged → rejected`
    pub async fn reject(&self, batch_id: Uuid, serial_number: &str, reason: &str) -> ReviewResult<()> {
        self.store.reject(serial_number, reason).await?;
        self.events.emit(IntakeEvent::RecordRejected {
            batch_id,
            serial_number: serial_number.to_string(),
            reason: reason.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.refresh_status(batch_id).await?;
        Ok(())
    }

    /// Confirm every record still staged in the batch
    ///
    /// Returns the serial numbers confirmed.
    pub async fn confirm_all(&self, batch_id: Uuid) -> ReviewResult<Vec<String>> {
        let staged = self.store.list_status(batch_id, RecordStatus::Staged).await?;
        let mut confirmed = Vec::with_capacity(staged.len());
        for record in staged {
            self.store.mark_previewed(&record.serial_number).await?;
            confirmed.push(record.serial_number);
        }
        info!(batch_id = %batch_id, count = confirmed.len(), "Batch confirmed en masse");
        self.refresh_status(batch_id).await?;
        Ok(confirmed)
    }

    /// Return a commit-failed record to staging for another review pass
    pub async fn retry(&self, serial_number: &str) -> ReviewResult<Uuid> {
        self.store.retry(serial_number).await?;
        let record = self
            .store
            .get(serial_number)
            .await?
            .ok_or_else(|| StagingError::NotFound(serial_number.to_string()))?;
        self.events.emit(IntakeEvent::RecordRetried {
            batch_id: record.batch_id,
            serial_number: serial_number.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.refresh_status(record.batch_id).await?;
        Ok(record.batch_id)
    }

    /// All records of a batch, for the preview screen
    pub async fn records(&self, batch_id: Uuid) -> ReviewResult<Vec<VoucherRecord>> {
        self.require_batch(batch_id).await?;
        Ok(self.store.list(batch_id).await?)
    }

    /// Batch report: review status plus per-status counts
    pub async fn report(&self, batch_id: Uuid) -> ReviewResult<BatchReport> {
        let batch = self.require_batch(batch_id).await?;
        let counts = self.store.counts(batch_id).await?;
        Ok(BatchReport {
            batch_id,
            submitted_by: batch.submitted_by,
            review_status: batch.review_status,
            counts,
            created_at: batch.created_at,
        })
    }

    /// Re-derive and persist the batch review status from record counts
    ///
    /// Emits `BatchConfirmed` on the pending/partial → confirmed edge.
    pub async fn refresh_status(&self, batch_id: Uuid) -> ReviewResult<ReviewStatus> {
        let batch = self.require_batch(batch_id).await?;
        let counts = self.store.counts(batch_id).await?;
        let derived = counts.derive_review_status();

        if derived != batch.review_status {
            batches::update_review_status(self.store.pool(), batch_id, derived).await?;
            info!(batch_id = %batch_id, from = batch.review_status.as_str(), to = derived.as_str(), "Batch review status");

            if derived == ReviewStatus::Confirmed {
                self.events.emit(IntakeEvent::BatchConfirmed {
                    batch_id,
                    previewed: counts.previewed,
                    rejected: counts.rejected,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        Ok(derived)
    }

    async fn require_batch(&self, batch_id: Uuid) -> ReviewResult<crate::models::Batch> {
        batches::get_batch(self.store.pool(), batch_id)
            .await?
            .ok_or(ReviewError::BatchNotFound(batch_id))
    }
}
