//! Staging store: the single source of truth between validation and commit
//!
//! All channels converge here. Uniqueness of active serial numbers is
//! enforced by the database's partial unique index via an atomic
//! insert-if-absent, independent of the validator's advisory duplicate
//! check, so concurrent writers racing on the same serial resolve
//! deterministically: first writer wins, second gets `DuplicateSerial`.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::records;
use crate::models::{RecordStatus, StatusCounts, VoucherRecord};

/// Staging store failures
#[derive(Debug, Error)]
pub enum StagingError {
    /// An active record with this serial number already exists
    #[error("duplicate serial number: {0}")]
    DuplicateSerial(String),

    /// Requested transition violates the record state machine. In correct
    /// usage this does not occur; treat as a bug signal, not a user error.
    #[error("invalid transition for {serial_number}: {from:?} -> {to:?}")]
    InvalidTransition {
        serial_number: String,
        from: RecordStatus,
        to: RecordStatus,
    },

    /// No active record with this serial number
    #[error("no active record for serial: {0}")]
    NotFound(String),

    #[error(transparent)]
    Common(#[from] mkit_common::Error),
}

pub type StagingResult<T> = std::result::Result<T, StagingError>;

/// Durable holding area for validated records pending review and commit
#[derive(Clone)]
pub struct StagingStore {
    pool: SqlitePool,
}

impl StagingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a validated record as `staged`
    ///
    /// The insert races against the partial unique index; a violation
    /// means another channel staged this serial first.
    pub async fn put(&self, mut record: VoucherRecord) -> StagingResult<VoucherRecord> {
        if record.transition_to(RecordStatus::Staged).is_none() {
            return Err(StagingError::InvalidTransition {
                serial_number: record.serial_number.clone(),
                from: record.status,
                to: RecordStatus::Staged,
            });
        }

        match records::insert_record(&self.pool, &record).await {
            Ok(()) => {
                info!(serial = %record.serial_number, batch_id = %record.batch_id, "Record staged");
                Ok(record)
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StagingError::DuplicateSerial(record.serial_number))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a rejected record for audit
    ///
    /// Rejected rows are exempt from the uniqueness index, so a rejection
    /// never blocks a corrected resubmission and never collides with an
    /// active record of the same serial.
    pub async fn record_rejection(
        &self,
        mut record: VoucherRecord,
        reason: &str,
    ) -> StagingResult<VoucherRecord> {
        if record.transition_to(RecordStatus::Rejected).is_none() {
            return Err(StagingError::InvalidTransition {
                serial_number: record.serial_number.clone(),
                from: record.status,
                to: RecordStatus::Rejected,
            });
        }
        record.rejection_reason = Some(reason.to_string());
        records::insert_record(&self.pool, &record).await?;
        warn!(serial = %record.serial_number, reason = %reason, "Record rejected");
        Ok(record)
    }

    /// Active record by serial number
    pub async fn get(&self, serial_number: &str) -> StagingResult<Option<VoucherRecord>> {
        Ok(records::get_active_by_serial(&self.pool, serial_number).await?)
    }

    /// All records of a batch (including rejected, for reporting)
    pub async fn list(&self, batch_id: Uuid) -> StagingResult<Vec<VoucherRecord>> {
        Ok(records::list_by_batch(&self.pool, batch_id).await?)
    }

    /// Records of a batch in a given status
    pub async fn list_status(
        &self,
        batch_id: Uuid,
        status: RecordStatus,
    ) -> StagingResult<Vec<VoucherRecord>> {
        Ok(records::list_by_batch_status(&self.pool, batch_id, status).await?)
    }

    /// Per-status counts for a batch
    pub async fn counts(&self, batch_id: Uuid) -> StagingResult<StatusCounts> {
        Ok(records::count_by_status(&self.pool, batch_id).await?)
    }

    /// Advisory duplicate check used by the validator
    pub async fn active_exists(&self, serial_number: &str) -> StagingResult<bool> {
        Ok(records::active_serial_exists(&self.pool, serial_number).await?)
    }

    pub async fn mark_previewed(&self, serial_number: &str) -> StagingResult<()> {
        self.transition(serial_number, RecordStatus::Staged, RecordStatus::Previewed, None)
            .await
    }

    pub async fn mark_committed(&self, serial_number: &str) -> StagingResult<()> {
        self.transition(serial_number, RecordStatus::Previewed, RecordStatus::Committed, None)
            .await
    }

    pub async fn mark_commit_failed(&self, serial_number: &str, reason: &str) -> StagingResult<()> {
        self.transition(
            serial_number,
            RecordStatus::Previewed,
            RecordStatus::CommitFailed,
            Some(reason),
        )
        .await
    }

    /// Operator reject during review
    pub async fn reject(&self, serial_number: &str, reason: &str) -> StagingResult<()> {
        self.transition(
            serial_number,
            RecordStatus::Staged,
            RecordStatus::Rejected,
            Some(reason),
        )
        .await
    }

    /// Manual retry of a failed commit: back to `staged` for re-review
    pub async fn retry(&self, serial_number: &str) -> StagingResult<()> {
        self.transition(
            serial_number,
            RecordStatus::CommitFailed,
            RecordStatus::Staged,
            None,
        )
        .await
    }

    /// Count an external commit attempt against the record
    pub async fn note_commit_attempt(&self, serial_number: &str) -> StagingResult<()> {
        Ok(records::increment_commit_attempts(&self.pool, serial_number).await?)
    }

    /// Remove a terminal record once it has aged past the retention window
    ///
    /// Staged and previewed records are never purged; the DELETE only
    /// matches terminal statuses.
    pub async fn purge(
        &self,
        serial_number: &str,
        retention_days: i64,
    ) -> StagingResult<bool> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let purged = records::purge_terminal(&self.pool, serial_number, cutoff).await?;
        if purged {
            info!(serial = %serial_number, "Purged terminal record");
        }
        Ok(purged)
    }

    /// Guarded status transition
    ///
    /// The conditional UPDATE is atomic: of two racing callers, exactly
    /// one observes `from` and wins. The loser gets `InvalidTransition`
    /// with the actual current status.
    async fn transition(
        &self,
        serial_number: &str,
        from: RecordStatus,
        to: RecordStatus,
        reason: Option<&str>,
    ) -> StagingResult<()> {
        debug_assert!(from.can_transition_to(to));

        let applied =
            records::update_status_guarded(&self.pool, serial_number, from, to, reason).await?;
        if applied {
            info!(serial = %serial_number, from = from.as_str(), to = to.as_str(), "Status transition");
            return Ok(());
        }

        match records::current_status(&self.pool, serial_number).await? {
            Some(actual) => Err(StagingError::InvalidTransition {
                serial_number: serial_number.to_string(),
                from: actual,
                to,
            }),
            None => Err(StagingError::NotFound(serial_number.to_string())),
        }
    }
}

/// Whether a database error is the serial-uniqueness index firing
fn is_unique_violation(error: &mkit_common::Error) -> bool {
    match error {
        mkit_common::Error::Database(sqlx::Error::Database(db_err)) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}
