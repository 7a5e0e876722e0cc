//! Batch persistence

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use mkit_common::{Error, Result};

use crate::models::{Batch, ReviewStatus};

pub async fn insert_batch(pool: &SqlitePool, batch: &Batch) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO batches (
            batch_id, submitted_by, record_count, review_status,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch.batch_id.to_string())
    .bind(&batch.submitted_by)
    .bind(batch.record_count)
    .bind(batch.review_status.as_str())
    .bind(batch.created_at.to_rfc3339())
    .bind(batch.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Option<Batch>> {
    let row = sqlx::query("SELECT * FROM batches WHERE batch_id = ?")
        .bind(batch_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let review_status: String = row.get("review_status");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");
            Ok(Some(Batch {
                batch_id,
                submitted_by: row.get("submitted_by"),
                record_count: row.get("record_count"),
                review_status: ReviewStatus::parse(&review_status).ok_or_else(|| {
                    Error::Internal(format!("Unknown review status: {}", review_status))
                })?,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Add newly ingested records to the batch count
pub async fn add_to_record_count(pool: &SqlitePool, batch_id: Uuid, n: i64) -> Result<()> {
    sqlx::query(
        "UPDATE batches SET record_count = record_count + ?, updated_at = ? WHERE batch_id = ?",
    )
    .bind(n)
    .bind(Utc::now().to_rfc3339())
    .bind(batch_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_review_status(
    pool: &SqlitePool,
    batch_id: Uuid,
    review_status: ReviewStatus,
) -> Result<()> {
    sqlx::query("UPDATE batches SET review_status = ?, updated_at = ? WHERE batch_id = ?")
        .bind(review_status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(batch_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in db: {}", e)))
}
