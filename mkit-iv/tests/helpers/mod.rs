//! Shared helpers for mkit-iv integration tests

// Each integration test binary compiles this module; not every binary
// uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

use mkit_common::config::RulesConfig;
use mkit_iv::models::{RecordStatus, SourceChannel, VoucherRecord};
use mkit_iv::services::{
    CoreInsertOutcome, CoreSink, CoreSinkError, SerialVerifier, VerificationStatus, VerifierError,
};

/// In-memory pool for single-connection tests
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    mkit_iv::db::init_tables(&pool).await.expect("Failed to init schema");
    pool
}

/// File-backed pool for tests that need real connection concurrency
pub async fn file_pool(dir: &tempfile::TempDir, max_connections: u32) -> SqlitePool {
    let db_path = dir.path().join("mkit-iv-test.db");
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .expect("Failed to create test database");
    mkit_iv::db::init_tables(&pool).await.expect("Failed to init schema");
    pool
}

/// Default validation rules matching the 16-char test serials
pub fn test_rules() -> RulesConfig {
    RulesConfig::default()
}

/// A record in `validated` status, ready for `StagingStore::put`
pub fn validated_record(serial: &str, batch_id: Uuid) -> VoucherRecord {
    let mut record = VoucherRecord::new(
        serial.to_string(),
        50000,
        "TSEL50".to_string(),
        SourceChannel::Form,
        "{}".to_string(),
        None,
        batch_id,
    );
    record.transition_to(RecordStatus::Normalized);
    record.transition_to(RecordStatus::Validated);
    record
}

/// Insert a batch row so review/commit operations can find it
pub async fn insert_batch(pool: &SqlitePool, submitted_by: &str) -> Uuid {
    let batch = mkit_iv::models::Batch::new(submitted_by.to_string());
    mkit_iv::db::batches::insert_batch(pool, &batch)
        .await
        .expect("Failed to insert batch");
    batch.batch_id
}

/// Scripted core sink for committer tests
///
/// `insert` consults the configured serial sets in order: timeout,
/// duplicate, reject. Every successful insert is remembered so `exists`
/// answers like a real core would — including inserts whose
/// acknowledgment "got lost" behind a timeout.
#[derive(Default)]
pub struct MockCoreSink {
    state: Mutex<MockCoreState>,
}

#[derive(Default)]
struct MockCoreState {
    /// Serials that time out on insert. When `insert_lands_on_timeout`
    /// is set, the row still reaches the core (lost acknowledgment).
    timeout_serials: HashSet<String>,
    insert_lands_on_timeout: bool,
    duplicate_serials: HashSet<String>,
    rejected_serials: HashSet<String>,
    stored: HashSet<String>,
    insert_calls: Vec<String>,
}

impl MockCoreSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn timeout_on(&self, serial: &str, insert_lands: bool) {
        let mut state = self.state.lock().unwrap();
        state.timeout_serials.insert(serial.to_string());
        state.insert_lands_on_timeout = insert_lands;
    }

    pub fn duplicate_on(&self, serial: &str) {
        self.state.lock().unwrap().duplicate_serials.insert(serial.to_string());
    }

    pub fn reject_on(&self, serial: &str) {
        self.state.lock().unwrap().rejected_serials.insert(serial.to_string());
    }

    pub fn clear_timeouts(&self) {
        self.state.lock().unwrap().timeout_serials.clear();
    }

    /// Number of insert attempts seen for a serial
    pub fn insert_calls(&self, serial: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .insert_calls
            .iter()
            .filter(|s| s.as_str() == serial)
            .count()
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.state.lock().unwrap().stored.contains(serial)
    }
}

#[async_trait]
impl CoreSink for MockCoreSink {
    async fn insert(&self, record: &VoucherRecord) -> Result<CoreInsertOutcome, CoreSinkError> {
        let mut state = self.state.lock().unwrap();
        let serial = record.serial_number.clone();
        state.insert_calls.push(serial.clone());

        if state.timeout_serials.contains(&serial) {
            if state.insert_lands_on_timeout {
                state.stored.insert(serial);
            }
            return Err(CoreSinkError::Timeout(5000));
        }
        if state.duplicate_serials.contains(&serial) || state.stored.contains(&serial) {
            return Ok(CoreInsertOutcome::Duplicate);
        }
        if state.rejected_serials.contains(&serial) {
            return Ok(CoreInsertOutcome::Rejected("schema violation".to_string()));
        }

        state.stored.insert(serial);
        Ok(CoreInsertOutcome::Inserted)
    }

    async fn exists(&self, serial_number: &str) -> Result<bool, CoreSinkError> {
        let state = self.state.lock().unwrap();
        Ok(state.stored.contains(serial_number) || state.duplicate_serials.contains(serial_number))
    }
}

/// Scripted verifier for validator tests
pub struct MockVerifier {
    used_serials: HashSet<String>,
    timeout: bool,
}

impl MockVerifier {
    pub fn passing() -> Arc<Self> {
        Arc::new(Self { used_serials: HashSet::new(), timeout: false })
    }

    pub fn with_used(serials: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            used_serials: serials.iter().map(|s| s.to_string()).collect(),
            timeout: false,
        })
    }

    pub fn timing_out() -> Arc<Self> {
        Arc::new(Self { used_serials: HashSet::new(), timeout: true })
    }
}

#[async_trait]
impl SerialVerifier for MockVerifier {
    async fn verify(&self, serial_number: &str) -> Result<VerificationStatus, VerifierError> {
        if self.timeout {
            return Err(VerifierError::Timeout(5000));
        }
        if self.used_serials.contains(serial_number) {
            return Ok(VerificationStatus::Used);
        }
        Ok(VerificationStatus::Unused)
    }
}
