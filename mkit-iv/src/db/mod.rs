//! Database access for mkit-iv
//!
//! SQLite-backed staging schema. The partial unique index on
//! `voucher_records.serial_number` (excluding rejected rows) is the
//! authoritative uniqueness gate for the whole pipeline; everything else
//! layers on top of it.

pub mod batches;
pub mod records;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the staging tables and indexes if they don't exist
///
/// Public so tests can initialize in-memory pools with the same schema.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voucher_records (
            record_id TEXT PRIMARY KEY,
            serial_number TEXT NOT NULL,
            voucher_number TEXT,
            expiry_date TEXT,
            denomination INTEGER NOT NULL,
            product_code TEXT NOT NULL,
            source_channel TEXT NOT NULL,
            raw_payload TEXT NOT NULL,
            confidence REAL,
            status TEXT NOT NULL,
            rejection_reason TEXT,
            batch_id TEXT NOT NULL,
            commit_attempts INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Uniqueness invariant: at most one non-rejected record per serial.
    // Rejected records stay behind as audit trail and never block a
    // corrected resubmission.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_records_active_serial
        ON voucher_records(serial_number)
        WHERE status != 'rejected'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_records_batch ON voucher_records(batch_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            batch_id TEXT PRIMARY KEY,
            submitted_by TEXT NOT NULL,
            record_count INTEGER NOT NULL DEFAULT 0,
            review_status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
