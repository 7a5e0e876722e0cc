//! Bulk committer: previewed records → external core
//!
//! Per-record outcomes are independent; a row the core rejects never
//! rolls back its siblings. Records are committed concurrently within a
//! batch (ordering is unspecified by contract). The guarded status
//! transition in the staging store gives per-record mutual exclusion:
//! of two racing commit invocations, exactly one records the outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use mkit_common::events::{EventBus, IntakeEvent};

use crate::db::batches;
use crate::models::{RecordStatus, ReviewStatus, VoucherRecord};
use crate::services::{CoreInsertOutcome, CoreSink, CoreSinkError};
use crate::staging::{StagingError, StagingStore};

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("batch not found: {0}")]
    BatchNotFound(Uuid),

    #[error("batch {0} has no previewed records to commit")]
    NothingToCommit(Uuid),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Common(#[from] mkit_common::Error),
}

/// What happened to one record during a commit run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordCommitOutcome {
    Committed { serial_number: String },
    Failed { serial_number: String, reason: String },
    /// Another commit invocation recorded this record's outcome first
    Skipped { serial_number: String },
}

/// Batch-level commit report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReport {
    pub batch_id: Uuid,
    pub committed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub review_status: ReviewStatus,
    pub outcomes: Vec<RecordCommitOutcome>,
}

/// Pushes confirmed records into the external core system
pub struct BulkCommitter {
    store: StagingStore,
    sink: Arc<dyn CoreSink>,
    events: EventBus,
}

impl BulkCommitter {
    pub fn new(store: StagingStore, sink: Arc<dyn CoreSink>, events: EventBus) -> Self {
        Self { store, sink, events }
    }

    /// Commit every previewed record of the batch
    pub async fn commit_batch(&self, batch_id: Uuid) -> Result<CommitReport, CommitError> {
        let batch = batches::get_batch(self.store.pool(), batch_id)
            .await?
            .ok_or(CommitError::BatchNotFound(batch_id))?;
        let previewed = self.store.list_status(batch_id, RecordStatus::Previewed).await?;
        if previewed.is_empty() {
            return Err(CommitError::NothingToCommit(batch_id));
        }

        info!(batch_id = %batch_id, records = previewed.len(), submitted_by = %batch.submitted_by, "Bulk commit started");

        let mut join_set = JoinSet::new();
        for record in previewed {
            let store = self.store.clone();
            let sink = Arc::clone(&self.sink);
            join_set.spawn(async move { commit_record(&store, sink.as_ref(), record).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined
                .map_err(|e| mkit_common::Error::Internal(format!("commit task panicked: {}", e)))?;
            outcomes.push(outcome?);
        }

        let committed = outcomes
            .iter()
            .filter(|o| matches!(o, RecordCommitOutcome::Committed { .. }))
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, RecordCommitOutcome::Failed { .. }))
            .count();
        let skipped = outcomes.len() - committed - failed;

        // Batch closes once nothing remains previewed; commit_failed
        // records stay visible in the report for operator retry.
        let counts = self.store.counts(batch_id).await?;
        let review_status = counts.derive_review_status();
        if review_status != batch.review_status {
            batches::update_review_status(self.store.pool(), batch_id, review_status).await?;
        }

        self.events.emit(IntakeEvent::BatchCommitted {
            batch_id,
            committed,
            failed,
            timestamp: chrono::Utc::now(),
        });
        info!(batch_id = %batch_id, committed, failed, skipped, "Bulk commit finished");

        Ok(CommitReport {
            batch_id,
            committed,
            failed,
            skipped,
            review_status,
            outcomes,
        })
    }
}

/// Commit one record, recording the outcome on the record itself
///
/// Every path ends in `mark_committed` or `mark_commit_failed`; a record
/// never stays `previewed` past a commit run.
async fn commit_record(
    store: &StagingStore,
    sink: &dyn CoreSink,
    record: VoucherRecord,
) -> Result<RecordCommitOutcome, CommitError> {
    let serial = record.serial_number.clone();

    // Lost-acknowledgment guard: if an earlier attempt may have landed,
    // ask the core before writing again so a retry never double-inserts.
    if record.commit_attempts > 0 {
        match sink.exists(&serial).await {
            Ok(true) => {
                info!(serial = %serial, "Prior commit landed in core; recording as committed");
                return finish(store, &serial, Ok(())).await;
            }
            Ok(false) => {}
            Err(e) => {
                return finish(store, &serial, Err(unreachable_reason(e))).await;
            }
        }
    }

    store.note_commit_attempt(&serial).await?;

    let result = match sink.insert(&record).await {
        Ok(CoreInsertOutcome::Inserted) => Ok(()),
        Ok(CoreInsertOutcome::Duplicate) => Err("duplicate in core".to_string()),
        Ok(CoreInsertOutcome::Rejected(reason)) => Err(format!("rejected by core: {}", reason)),
        Err(e) => Err(unreachable_reason(e)),
    };

    finish(store, &serial, result).await
}

/// Record the outcome, treating a lost transition race as a skip
async fn finish(
    store: &StagingStore,
    serial: &str,
    result: Result<(), String>,
) -> Result<RecordCommitOutcome, CommitError> {
    let marked = match &result {
        Ok(()) => store.mark_committed(serial).await,
        Err(reason) => store.mark_commit_failed(serial, reason).await,
    };

    match marked {
        Ok(()) => Ok(match result {
            Ok(()) => RecordCommitOutcome::Committed { serial_number: serial.to_string() },
            Err(reason) => {
                warn!(serial = %serial, reason = %reason, "Commit failed");
                RecordCommitOutcome::Failed { serial_number: serial.to_string(), reason }
            }
        }),
        Err(StagingError::InvalidTransition { from, .. }) => {
            warn!(serial = %serial, actual = from.as_str(), "Record already left previewed; skipping");
            Ok(RecordCommitOutcome::Skipped { serial_number: serial.to_string() })
        }
        Err(e) => Err(e.into()),
    }
}

fn unreachable_reason(e: CoreSinkError) -> String {
    match e {
        CoreSinkError::Timeout(ms) => format!("core unreachable: timeout after {}ms", ms),
        CoreSinkError::Unreachable(detail) => format!("core unreachable: {}", detail),
        CoreSinkError::Protocol(detail) => format!("core protocol error: {}", detail),
    }
}
