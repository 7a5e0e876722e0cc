//! Event types for the mkit intake event system
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE
//! transmission to connected operator UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Intake pipeline events
///
/// One variant per observable stage transition; every variant carries the
/// batch it belongs to so UIs can correlate events to an open review screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// A new batch was opened by an input channel
    BatchOpened {
        batch_id: Uuid,
        source_channel: String,
        submitted_by: String,
        timestamp: DateTime<Utc>,
    },

    /// A record passed validation and reached the staging store
    RecordStaged {
        batch_id: Uuid,
        serial_number: String,
        timestamp: DateTime<Utc>,
    },

    /// A record was rejected (validation failure or operator reject)
    RecordRejected {
        batch_id: Uuid,
        serial_number: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Every record of the batch has left staging review
    BatchConfirmed {
        batch_id: Uuid,
        previewed: usize,
        rejected: usize,
        timestamp: DateTime<Utc>,
    },

    /// Bulk commit finished for the batch
    BatchCommitted {
        batch_id: Uuid,
        committed: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A commit-failed record was returned to staging for retry
    RecordRetried {
        batch_id: Uuid,
        serial_number: String,
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// SSE event name for this variant
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::BatchOpened { .. } => "batch_opened",
            IntakeEvent::RecordStaged { .. } => "record_staged",
            IntakeEvent::RecordRejected { .. } => "record_rejected",
            IntakeEvent::BatchConfirmed { .. } => "batch_confirmed",
            IntakeEvent::BatchCommitted { .. } => "batch_committed",
            IntakeEvent::RecordRetried { .. } => "record_retried",
        }
    }
}

/// Broadcast bus for intake events
///
/// Thin wrapper over `tokio::sync::broadcast`; emitting with no subscribers
/// is not an error (events are advisory, the staging store is the record
/// of truth).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: IntakeEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0, // no subscribers listening
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(IntakeEvent::RecordStaged {
            batch_id: Uuid::new_v4(),
            serial_number: "ABCD1234EFGH5678".to_string(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "record_staged");
    }

    #[test]
    fn emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        let delivered = bus.emit(IntakeEvent::BatchConfirmed {
            batch_id: Uuid::new_v4(),
            previewed: 3,
            rejected: 1,
            timestamp: Utc::now(),
        });
        assert_eq!(delivered, 0);
    }
}
