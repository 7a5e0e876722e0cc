//! Intake pipeline: normalize → validate → stage
//!
//! One submission opens one batch. Records are processed concurrently;
//! a failure of any record never aborts its siblings. Rejections at
//! validation are persisted on the record itself; normalization failures
//! have no record to persist and are reported in the submission outcome
//! only.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use mkit_common::events::{EventBus, IntakeEvent};

use crate::channels::{self, ChannelInput};
use crate::db::batches;
use crate::models::Batch;
use crate::staging::{StagingError, StagingStore};
use crate::validators::{ValidationOutcome, Validator};

/// Per-record result of a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// 1-based input position (file line for CSV uploads)
    pub position: usize,
    /// Absent when normalization failed before a serial was known
    pub serial_number: Option<String>,
    pub staged: bool,
    pub reason: Option<String>,
}

/// Batch-level summary returned to the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: Uuid,
    pub staged: usize,
    pub rejected: usize,
    pub outcomes: Vec<RecordOutcome>,
}

/// The funnel all input channels converge on
pub struct IntakePipeline {
    store: StagingStore,
    validator: Arc<Validator>,
    events: EventBus,
}

impl IntakePipeline {
    pub fn new(store: StagingStore, validator: Arc<Validator>, events: EventBus) -> Self {
        Self { store, validator, events }
    }

    /// Ingest one submission as a new batch
    pub async fn ingest(
        &self,
        inputs: Vec<ChannelInput>,
        submitted_by: &str,
    ) -> mkit_common::Result<IngestReport> {
        let batch = Batch::new(submitted_by.to_string());
        let batch_id = batch.batch_id;
        batches::insert_batch(self.store.pool(), &batch).await?;
        batches::add_to_record_count(self.store.pool(), batch_id, inputs.len() as i64).await?;

        let source = inputs
            .first()
            .map(|i| i.source_channel().as_str())
            .unwrap_or("empty");
        self.events.emit(IntakeEvent::BatchOpened {
            batch_id,
            source_channel: source.to_string(),
            submitted_by: submitted_by.to_string(),
            timestamp: chrono::Utc::now(),
        });
        info!(batch_id = %batch_id, source, records = inputs.len(), "Batch opened");

        // Normalization and the stateless checks are pure per record, so
        // every record runs concurrently; the staging insert is the only
        // serialization point, and only for records racing on one serial.
        let mut join_set = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let store = self.store.clone();
            let validator = Arc::clone(&self.validator);
            let events = self.events.clone();
            join_set.spawn(async move {
                let outcome = process_record(&store, &validator, &events, input, index, batch_id).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<RecordOutcome>> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) = joined
                .map_err(|e| mkit_common::Error::Internal(format!("record task panicked: {}", e)))?;
            if outcomes.len() <= index {
                outcomes.resize(index + 1, None);
            }
            outcomes[index] = Some(outcome?);
        }

        let outcomes: Vec<RecordOutcome> = outcomes.into_iter().flatten().collect();
        let staged = outcomes.iter().filter(|o| o.staged).count();
        let rejected = outcomes.len() - staged;
        info!(batch_id = %batch_id, staged, rejected, "Batch ingest finished");

        Ok(IngestReport { batch_id, staged, rejected, outcomes })
    }
}

/// Funnel one record: normalize, validate, stage
async fn process_record(
    store: &StagingStore,
    validator: &Validator,
    events: &EventBus,
    input: ChannelInput,
    index: usize,
    batch_id: Uuid,
) -> mkit_common::Result<RecordOutcome> {
    let position = match &input {
        ChannelInput::Csv { line_number, .. } => *line_number,
        _ => index + 1,
    };

    let mut record = match channels::normalize(&input, batch_id) {
        Ok(record) => record,
        Err(e) => {
            // Nothing to persist: the input never produced a record
            return Ok(RecordOutcome {
                position,
                serial_number: None,
                staged: false,
                reason: Some(e.to_string()),
            });
        }
    };
    let serial_number = record.serial_number.clone();

    match validator.validate(&mut record).await? {
        ValidationOutcome::Accepted => {}
        ValidationOutcome::Rejected(e) => {
            let reason = e.to_string();
            store
                .record_rejection(record, &reason)
                .await
                .map_err(|e| mkit_common::Error::Internal(e.to_string()))?;
            events.emit(IntakeEvent::RecordRejected {
                batch_id,
                serial_number: serial_number.clone(),
                reason: reason.clone(),
                timestamp: chrono::Utc::now(),
            });
            return Ok(RecordOutcome {
                position,
                serial_number: Some(serial_number),
                staged: false,
                reason: Some(reason),
            });
        }
    }

    match store.put(record).await {
        Ok(_) => {
            events.emit(IntakeEvent::RecordStaged {
                batch_id,
                serial_number: serial_number.clone(),
                timestamp: chrono::Utc::now(),
            });
            Ok(RecordOutcome {
                position,
                serial_number: Some(serial_number),
                staged: true,
                reason: None,
            })
        }
        // Lost the insert race: another channel staged this serial
        // between the advisory check and our insert.
        Err(StagingError::DuplicateSerial(serial)) => {
            let reason = format!("duplicate serial in staging: {}", serial);
            events.emit(IntakeEvent::RecordRejected {
                batch_id,
                serial_number: serial.clone(),
                reason: reason.clone(),
                timestamp: chrono::Utc::now(),
            });
            Ok(RecordOutcome {
                position,
                serial_number: Some(serial),
                staged: false,
                reason: Some(reason),
            })
        }
        Err(e) => {
            error!(serial = %serial_number, error = %e, "Staging insert failed");
            Err(mkit_common::Error::Internal(e.to_string()))
        }
    }
}
