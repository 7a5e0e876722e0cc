//! Concurrency tests
//!
//! The staging store's insert-if-absent must hold under concurrent
//! writers from different channels; unrelated serials proceed in
//! parallel.

mod helpers;

use std::sync::Arc;
use tokio::task::JoinSet;

use helpers::{file_pool, insert_batch, validated_record};
use mkit_iv::staging::{StagingError, StagingStore};

#[tokio::test]
async fn concurrent_duplicate_race_stages_exactly_one() {
    // Given: two channels submit the same serial simultaneously
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir, 5).await;
    let store = Arc::new(StagingStore::new(pool.clone()));
    let batch_a = insert_batch(&pool, "op-csv").await;
    let batch_b = insert_batch(&pool, "op-form").await;

    let serial = "AAAA111122223333";
    let mut join_set = JoinSet::new();
    for batch_id in [batch_a, batch_b] {
        let store = Arc::clone(&store);
        let record = validated_record(serial, batch_id);
        join_set.spawn(async move { store.put(record).await });
    }

    let mut staged = 0;
    let mut duplicates = 0;
    while let Some(result) = join_set.join_next().await {
        match result.expect("task panicked") {
            Ok(_) => staged += 1,
            Err(StagingError::DuplicateSerial(s)) => {
                assert_eq!(s, serial);
                duplicates += 1;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // Then: first writer wins, second fails with DuplicateSerial
    assert_eq!(staged, 1);
    assert_eq!(duplicates, 1);

    let record = store.get(serial).await.unwrap().unwrap();
    assert_eq!(record.serial_number, serial);
}

#[tokio::test]
async fn distinct_serials_stage_fully_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir, 5).await;
    let store = Arc::new(StagingStore::new(pool.clone()));
    let batch_id = insert_batch(&pool, "op-1").await;

    let mut join_set = JoinSet::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        let serial = format!("SER{:04}1122223333", i);
        join_set.spawn(async move { store.put(validated_record(&serial, batch_id)).await });
    }

    let mut staged = 0;
    while let Some(result) = join_set.join_next().await {
        result.expect("task panicked").expect("put failed");
        staged += 1;
    }
    assert_eq!(staged, 20);

    let counts = store.counts(batch_id).await.unwrap();
    assert_eq!(counts.staged, 20);
}

#[tokio::test]
async fn racing_status_transitions_resolve_to_one_winner() {
    // Two commit invocations race to record an outcome for one record;
    // the guarded update lets exactly one through
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir, 5).await;
    let store = Arc::new(StagingStore::new(pool.clone()));
    let batch_id = insert_batch(&pool, "op-1").await;

    let serial = "AAAA111122223333";
    store.put(validated_record(serial, batch_id)).await.unwrap();
    store.mark_previewed(serial).await.unwrap();

    let mut join_set = JoinSet::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        join_set.spawn(async move { store.mark_committed(serial).await });
    }

    let mut wins = 0;
    let mut losses = 0;
    while let Some(result) = join_set.join_next().await {
        match result.expect("task panicked") {
            Ok(()) => wins += 1,
            Err(StagingError::InvalidTransition { .. }) => losses += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(losses, 1);
}
