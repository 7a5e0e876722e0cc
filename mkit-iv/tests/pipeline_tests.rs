//! End-to-end intake pipeline tests
//!
//! Channel input → normalize → validate → stage, with per-record
//! failure isolation.

mod helpers;

use std::sync::Arc;

use helpers::{memory_pool, test_rules};
use mkit_common::events::EventBus;
use mkit_iv::channels::{csv, ChannelInput, FormFields};
use mkit_iv::models::RecordStatus;
use mkit_iv::pipeline::IntakePipeline;
use mkit_iv::staging::StagingStore;
use mkit_iv::validators::Validator;

async fn pipeline() -> (IntakePipeline, StagingStore) {
    let pool = memory_pool().await;
    let store = StagingStore::new(pool);
    let validator = Arc::new(Validator::new(test_rules(), store.clone(), None));
    let pipeline = IntakePipeline::new(store.clone(), validator, EventBus::new(64));
    (pipeline, store)
}

fn csv_inputs(payload: &str) -> Vec<ChannelInput> {
    let (columns, rows) = csv::split_upload(payload);
    rows.into_iter()
        .map(|(line_number, line)| ChannelInput::Csv { line, line_number, columns: columns.clone() })
        .collect()
}

#[tokio::test]
async fn csv_upload_stages_good_rows_and_rejects_bad_ones() {
    let (pipeline, store) = pipeline().await;

    // Row 3 has a malformed amount; its siblings must stage normally
    let payload = "\
serial_number,denomination,product_code
AAAA111122223333,50.000,TSEL50
BBBB111122223333,abc,TSEL50
CCCC111122223333,100.000,TSEL100
";
    let report = pipeline.ingest(csv_inputs(payload), "op-1").await.unwrap();

    assert_eq!(report.staged, 2);
    assert_eq!(report.rejected, 1);

    let bad = report.outcomes.iter().find(|o| !o.staged).unwrap();
    assert_eq!(bad.position, 3);
    assert!(bad.reason.as_ref().unwrap().contains("unparseable amount"));

    let counts = store.counts(report.batch_id).await.unwrap();
    assert_eq!(counts.staged, 2);
    // The malformed row never produced a record, so nothing was persisted
    assert_eq!(counts.rejected, 0);
}

#[tokio::test]
async fn validation_rejections_are_persisted_with_reasons() {
    let (pipeline, store) = pipeline().await;

    // Valid shape, but serial is 8 chars against the 16-char rule
    let payload = "AAAA1111,50.000,TSEL50\nBBBB111122223333,50.000,TSEL50\n";
    let report = pipeline.ingest(csv_inputs(payload), "op-1").await.unwrap();

    assert_eq!(report.staged, 1);
    assert_eq!(report.rejected, 1);

    let counts = store.counts(report.batch_id).await.unwrap();
    assert_eq!(counts.rejected, 1);
    let all = store.list(report.batch_id).await.unwrap();
    let rejected = all.iter().find(|r| r.status == RecordStatus::Rejected).unwrap();
    assert!(rejected.rejection_reason.as_ref().unwrap().contains("invalid format"));
}

#[tokio::test]
async fn duplicate_across_submissions_is_rejected_second_time() {
    let (pipeline, store) = pipeline().await;

    let first = pipeline
        .ingest(csv_inputs("AAAA111122223333,50.000,TSEL50\n"), "op-1")
        .await
        .unwrap();
    assert_eq!(first.staged, 1);

    let second = pipeline
        .ingest(csv_inputs("AAAA111122223333,50.000,TSEL50\n"), "op-2")
        .await
        .unwrap();
    assert_eq!(second.staged, 0);
    assert_eq!(second.rejected, 1);
    let outcome = &second.outcomes[0];
    assert!(outcome.reason.as_ref().unwrap().contains("duplicate serial"));

    // Exactly one active record exists for the serial
    let record = store.get("AAAA111122223333").await.unwrap().unwrap();
    assert_eq!(record.batch_id, first.batch_id);
}

#[tokio::test]
async fn corrected_resubmission_after_rejection_stages_once() {
    let (pipeline, store) = pipeline().await;

    // Typo: serial too short → rejected
    let first = pipeline
        .ingest(csv_inputs("AAAA11112222333,50.000,TSEL50\n"), "op-1")
        .await
        .unwrap();
    assert_eq!(first.rejected, 1);

    // Corrected serial → staged; the old rejection stays as audit only
    let second = pipeline
        .ingest(csv_inputs("AAAA111122223333,50.000,TSEL50\n"), "op-1")
        .await
        .unwrap();
    assert_eq!(second.staged, 1);

    let record = store.get("AAAA111122223333").await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Staged);
}

#[tokio::test]
async fn form_and_ocr_records_differ_in_confidence() {
    let (pipeline, store) = pipeline().await;

    let form = ChannelInput::Form(FormFields {
        serial_number: "AAAA111122223333".to_string(),
        denomination: "50.000".to_string(),
        product_code: "TSEL50".to_string(),
        voucher_number: None,
        expiry_date: None,
    });
    let ocr = ChannelInput::Ocr {
        text: "SN BB12CD34EF56GH78 Rp 50.000".to_string(),
        product_code: "TSEL50".to_string(),
        confidence: 0.77,
    };

    let report = pipeline.ingest(vec![form], "op-1").await.unwrap();
    assert_eq!(report.staged, 1);
    let report = pipeline.ingest(vec![ocr], "op-1").await.unwrap();
    assert_eq!(report.staged, 1);

    let form_record = store.get("AAAA111122223333").await.unwrap().unwrap();
    assert_eq!(form_record.confidence, None);

    let ocr_record = store.get("BB12CD34EF56GH78").await.unwrap().unwrap();
    assert_eq!(ocr_record.confidence, Some(0.77));
    assert!(ocr_record.raw_payload.contains("SN BB12CD34EF56GH78"));
}

#[tokio::test]
async fn batch_report_reflects_review_progress() {
    let (pipeline, store) = pipeline().await;
    let payload = "AAAA111122223333,50.000,TSEL50\nBBBB111122223333,50.000,TSEL50\n";
    let report = pipeline.ingest(csv_inputs(payload), "op-1").await.unwrap();

    use mkit_iv::models::ReviewStatus;
    use mkit_iv::review::ReviewSession;

    let review = ReviewSession::new(store.clone(), EventBus::new(16));
    assert_eq!(review.report(report.batch_id).await.unwrap().review_status, ReviewStatus::Pending);

    review.confirm(report.batch_id, "AAAA111122223333").await.unwrap();
    assert_eq!(
        review.report(report.batch_id).await.unwrap().review_status,
        ReviewStatus::PartiallyReviewed
    );

    review.reject(report.batch_id, "BBBB111122223333", "smudged photo").await.unwrap();
    let final_report = review.report(report.batch_id).await.unwrap();
    assert_eq!(final_report.review_status, ReviewStatus::Confirmed);
    assert_eq!(final_report.counts.previewed, 1);
    assert_eq!(final_report.counts.rejected, 1);
}
