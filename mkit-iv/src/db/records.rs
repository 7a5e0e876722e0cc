//! Voucher record persistence
//!
//! Low-level row access; state-machine enforcement lives in
//! `staging::StagingStore`, which is the only caller of the guarded
//! update here.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use mkit_common::{Error, Result};

use crate::models::{RecordStatus, SourceChannel, StatusCounts, VoucherRecord};

/// Insert a record with its current status
///
/// Bubbles the raw sqlx error so callers can distinguish the unique-index
/// violation on `serial_number` from other database failures.
pub async fn insert_record(pool: &SqlitePool, record: &VoucherRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO voucher_records (
            record_id, serial_number, voucher_number, expiry_date,
            denomination, product_code, source_channel, raw_payload,
            confidence, status, rejection_reason, batch_id,
            commit_attempts, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.record_id.to_string())
    .bind(&record.serial_number)
    .bind(&record.voucher_number)
    .bind(&record.expiry_date)
    .bind(record.denomination)
    .bind(&record.product_code)
    .bind(record.source_channel.as_str())
    .bind(&record.raw_payload)
    .bind(record.confidence)
    .bind(record.status.as_str())
    .bind(&record.rejection_reason)
    .bind(record.batch_id.to_string())
    .bind(record.commit_attempts)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the active (non-rejected) record for a serial number
pub async fn get_active_by_serial(
    pool: &SqlitePool,
    serial_number: &str,
) -> Result<Option<VoucherRecord>> {
    let row = sqlx::query(
        "SELECT * FROM voucher_records WHERE serial_number = ? AND status != 'rejected'",
    )
    .bind(serial_number)
    .fetch_optional(pool)
    .await?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// Whether an active record with this serial exists (advisory check)
pub async fn active_serial_exists(pool: &SqlitePool, serial_number: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM voucher_records WHERE serial_number = ? AND status != 'rejected'",
    )
    .bind(serial_number)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// All records of a batch, oldest first
pub async fn list_by_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Vec<VoucherRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM voucher_records WHERE batch_id = ? ORDER BY created_at, record_id",
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Records of a batch currently in the given status
pub async fn list_by_batch_status(
    pool: &SqlitePool,
    batch_id: Uuid,
    status: RecordStatus,
) -> Result<Vec<VoucherRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM voucher_records WHERE batch_id = ? AND status = ? ORDER BY created_at, record_id",
    )
    .bind(batch_id.to_string())
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Conditionally move the active record for `serial_number` from `from`
/// to `to`
///
/// Returns `true` when exactly this transition was applied; `false` when
/// the record was not in `from` (raced or illegal — the caller decides).
/// The WHERE clause on the current status is what makes concurrent
/// transitions race-safe: only one caller wins.
pub async fn update_status_guarded(
    pool: &SqlitePool,
    serial_number: &str,
    from: RecordStatus,
    to: RecordStatus,
    reason: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE voucher_records
        SET status = ?, rejection_reason = ?, updated_at = ?
        WHERE serial_number = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .bind(serial_number)
    .bind(from.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Current status of the active record, if any
pub async fn current_status(
    pool: &SqlitePool,
    serial_number: &str,
) -> Result<Option<RecordStatus>> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM voucher_records WHERE serial_number = ? AND status != 'rejected'",
    )
    .bind(serial_number)
    .fetch_optional(pool)
    .await?;

    match status {
        Some(s) => {
            let parsed = RecordStatus::parse(&s)
                .ok_or_else(|| Error::Internal(format!("Unknown record status in db: {}", s)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Record the outcome of an external commit attempt
pub async fn increment_commit_attempts(pool: &SqlitePool, serial_number: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE voucher_records
        SET commit_attempts = commit_attempts + 1, updated_at = ?
        WHERE serial_number = ? AND status != 'rejected'
        "#,
    )
    .bind(Utc::now().to_rfc3339())
    .bind(serial_number)
    .execute(pool)
    .await?;
    Ok(())
}

/// Per-status counts for a batch
pub async fn count_by_status(pool: &SqlitePool, batch_id: Uuid) -> Result<StatusCounts> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM voucher_records WHERE batch_id = ? GROUP BY status",
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        if let Some(status) = RecordStatus::parse(&status) {
            for _ in 0..n {
                counts.add(status);
            }
        }
    }
    Ok(counts)
}

/// Delete a terminal record older than `cutoff`
///
/// Returns `true` when a row was removed. Active records are never
/// matched by the WHERE clause.
pub async fn purge_terminal(
    pool: &SqlitePool,
    serial_number: &str,
    cutoff: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM voucher_records
        WHERE serial_number = ?
          AND status IN ('committed', 'rejected')
          AND updated_at < ?
        "#,
    )
    .bind(serial_number)
    .bind(cutoff.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Map a database row back to a record
fn record_from_row(row: &SqliteRow) -> Result<VoucherRecord> {
    let record_id: String = row.get("record_id");
    let batch_id: String = row.get("batch_id");
    let source_channel: String = row.get("source_channel");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(VoucherRecord {
        record_id: Uuid::parse_str(&record_id)
            .map_err(|e| Error::Internal(format!("Bad record_id in db: {}", e)))?,
        serial_number: row.get("serial_number"),
        voucher_number: row.get("voucher_number"),
        expiry_date: row.get("expiry_date"),
        denomination: row.get("denomination"),
        product_code: row.get("product_code"),
        source_channel: SourceChannel::parse(&source_channel)
            .ok_or_else(|| Error::Internal(format!("Unknown source channel: {}", source_channel)))?,
        raw_payload: row.get("raw_payload"),
        confidence: row.get("confidence"),
        status: RecordStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown record status: {}", status)))?,
        rejection_reason: row.get("rejection_reason"),
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| Error::Internal(format!("Bad batch_id in db: {}", e)))?,
        commit_attempts: row.get("commit_attempts"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in db: {}", e)))
}
