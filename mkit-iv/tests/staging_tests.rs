//! Staging store tests
//!
//! Uniqueness enforcement, rejection audit trail, and purge rules

mod helpers;

use uuid::Uuid;

use helpers::{insert_batch, memory_pool, validated_record};
use mkit_iv::models::RecordStatus;
use mkit_iv::staging::{StagingError, StagingStore};

const SERIAL: &str = "AAAA111122223333";

#[tokio::test]
async fn put_stages_a_validated_record() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    let staged = store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    assert_eq!(staged.status, RecordStatus::Staged);

    let fetched = store.get(SERIAL).await.unwrap().unwrap();
    assert_eq!(fetched.serial_number, SERIAL);
    assert_eq!(fetched.status, RecordStatus::Staged);
    assert_eq!(fetched.batch_id, batch_id);
}

#[tokio::test]
async fn second_put_with_same_serial_is_duplicate() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    let err = store.put(validated_record(SERIAL, batch_id)).await.unwrap_err();
    assert!(matches!(err, StagingError::DuplicateSerial(s) if s == SERIAL));
}

#[tokio::test]
async fn put_requires_validated_status() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    let mut record = validated_record(SERIAL, batch_id);
    record.status = RecordStatus::Normalized; // skipped validation
    let err = store.put(record).await.unwrap_err();
    assert!(matches!(err, StagingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn rejected_record_does_not_block_resubmission() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    // First attempt rejected during validation
    let mut first = validated_record(SERIAL, batch_id);
    first.status = RecordStatus::Normalized;
    store.record_rejection(first, "invalid format: serial length 15").await.unwrap();

    // Corrected resubmission stages cleanly as a brand-new entity
    let staged = store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    assert_eq!(staged.status, RecordStatus::Staged);

    // Both rows exist: one rejected (audit), one staged (active)
    let all = store.list(batch_id).await.unwrap();
    assert_eq!(all.len(), 2);
    let counts = store.counts(batch_id).await.unwrap();
    assert_eq!(counts.rejected, 1);
    assert_eq!(counts.staged, 1);
}

#[tokio::test]
async fn operator_reject_records_reason() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    store.reject(SERIAL, "photo does not match serial").await.unwrap();

    // Rejected rows are not active
    assert!(store.get(SERIAL).await.unwrap().is_none());
    let all = store.list(batch_id).await.unwrap();
    assert_eq!(all[0].status, RecordStatus::Rejected);
    assert_eq!(all[0].rejection_reason.as_deref(), Some("photo does not match serial"));
}

#[tokio::test]
async fn purge_never_touches_staged_or_previewed() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    // Retention 0 would make any terminal record purgeable immediately
    assert!(!store.purge(SERIAL, 0).await.unwrap());
    assert!(store.get(SERIAL).await.unwrap().is_some());

    store.mark_previewed(SERIAL).await.unwrap();
    assert!(!store.purge(SERIAL, 0).await.unwrap());
    assert!(store.get(SERIAL).await.unwrap().is_some());
}

#[tokio::test]
async fn purge_removes_aged_committed_record() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    store.put(validated_record(SERIAL, batch_id)).await.unwrap();
    store.mark_previewed(SERIAL).await.unwrap();
    store.mark_committed(SERIAL).await.unwrap();

    // Inside the retention window: kept
    assert!(!store.purge(SERIAL, 7).await.unwrap());
    // Window elapsed (negative retention puts the cutoff in the future)
    assert!(store.purge(SERIAL, -1).await.unwrap());
    assert!(store.list(batch_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_serial_is_not_found() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    insert_batch(&pool, "op-1").await;

    let err = store.mark_previewed("ZZZZ000000000000").await.unwrap_err();
    assert!(matches!(err, StagingError::NotFound(_)));
    assert!(store.get("ZZZZ000000000000").await.unwrap().is_none());
}

#[tokio::test]
async fn list_status_filters_by_status() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_id = insert_batch(&pool, "op-1").await;

    store.put(validated_record("AAAA111122223333", batch_id)).await.unwrap();
    store.put(validated_record("BBBB111122223333", batch_id)).await.unwrap();
    store.mark_previewed("AAAA111122223333").await.unwrap();

    let staged = store.list_status(batch_id, RecordStatus::Staged).await.unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].serial_number, "BBBB111122223333");

    let previewed = store.list_status(batch_id, RecordStatus::Previewed).await.unwrap();
    assert_eq!(previewed.len(), 1);
    assert_eq!(previewed[0].serial_number, "AAAA111122223333");
}

#[tokio::test]
async fn records_in_other_batches_are_untouched() {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool.clone());
    let batch_a = insert_batch(&pool, "op-1").await;
    let batch_b = insert_batch(&pool, "op-2").await;

    store.put(validated_record("AAAA111122223333", batch_a)).await.unwrap();
    store.put(validated_record("BBBB111122223333", batch_b)).await.unwrap();

    assert_eq!(store.list(batch_a).await.unwrap().len(), 1);
    assert_eq!(store.list(batch_b).await.unwrap().len(), 1);
    assert_eq!(store.list(Uuid::new_v4()).await.unwrap().len(), 0);
}
