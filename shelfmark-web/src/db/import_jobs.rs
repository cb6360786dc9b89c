//! Import job persistence
//!
//! The job row is the unit of crash recovery: counters are flushed with
//! atomic increments after every row so the status publisher can read a
//! consistent snapshot at any time, and `finished_at` is only ever set
//! through COALESCE so it sticks on the first terminal transition.

use crate::models::{ImportJob, ImportOptions, ImportStatus};
use chrono::{DateTime, Utc};
use shelfmark_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Everything needed to create a job at upload time
pub struct NewImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub payload: Vec<u8>,
    pub options: ImportOptions,
}

/// Counter deltas produced by one processed row
#[derive(Debug, Default, Clone, Copy)]
pub struct RowCounters {
    pub processed: i64,
    pub imported: i64,
    pub failed: i64,
    pub warnings: i64,
}

/// Insert a new job in `queued` status
pub async fn create(pool: &SqlitePool, job: &NewImportJob) -> Result<()> {
    let options = serde_json::to_string(&job.options)
        .map_err(|e| Error::Internal(format!("Failed to serialize options: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO import_jobs (id, user_id, filename, payload, options, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'queued', ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.user_id.to_string())
    .bind(&job.filename)
    .bind(&job.payload)
    .bind(&options)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a job by id (payload excluded)
pub async fn load(pool: &SqlitePool, id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_JOB))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| job_from_row(&r)).transpose()
}

/// Load a job by id, scoped to its owner
pub async fn load_for_user(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(&format!("{} WHERE id = ? AND user_id = ?", SELECT_JOB))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| job_from_row(&r)).transpose()
}

/// List a user's jobs, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ImportJob>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC",
        SELECT_JOB
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Load the raw CSV payload and parsed options for processing
pub async fn load_payload(pool: &SqlitePool, id: Uuid) -> Result<Option<(Vec<u8>, String)>> {
    let row = sqlx::query("SELECT payload, options FROM import_jobs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| (r.get("payload"), r.get("options"))))
}

/// Transition a claimed job into `processing`
///
/// Resets the counters: a redelivered job re-attempts every row
/// (at-least-once semantics), so stale counts from the interrupted run
/// must not survive. `started_at` is kept from the first delivery.
pub async fn begin_processing(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'processing',
            started_at = COALESCE(started_at, ?),
            total_rows = 0,
            processed_rows = 0,
            imported_rows = 0,
            failed_rows = 0,
            warning_rows = 0,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the row total once the CSV envelope has parsed
pub async fn set_total_rows(pool: &SqlitePool, id: Uuid, total: i64) -> Result<()> {
    sqlx::query("UPDATE import_jobs SET total_rows = ?, updated_at = ? WHERE id = ?")
        .bind(total)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Flush one row's counter deltas as a single atomic increment
pub async fn apply_row_counters(pool: &SqlitePool, id: Uuid, counters: RowCounters) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE import_jobs
        SET processed_rows = processed_rows + ?,
            imported_rows = imported_rows + ?,
            failed_rows = failed_rows + ?,
            warning_rows = warning_rows + ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(counters.processed)
    .bind(counters.imported)
    .bind(counters.failed)
    .bind(counters.warnings)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Enter a terminal status with a summary; `finished_at` sticks on the
/// first terminal transition
pub async fn finish(
    pool: &SqlitePool,
    id: Uuid,
    status: ImportStatus,
    summary: serde_json::Value,
) -> Result<()> {
    debug_assert!(status.is_terminal());
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = ?,
            summary = ?,
            finished_at = COALESCE(finished_at, ?),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(summary.to_string())
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Force a non-terminal job to `failed` (envelope errors, queue abandon)
pub async fn mark_failed(pool: &SqlitePool, id: Uuid, message: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'failed',
            summary = ?,
            finished_at = COALESCE(finished_at, ?),
            updated_at = ?
        WHERE id = ?
          AND status NOT IN ('completed', 'completed_with_errors', 'failed')
        "#,
    )
    .bind(serde_json::json!({ "error": message }).to_string())
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

const SELECT_JOB: &str = r#"
    SELECT id, user_id, filename, status,
           total_rows, processed_rows, imported_rows, failed_rows, warning_rows,
           summary, started_at, finished_at, created_at, updated_at
    FROM import_jobs
"#;

fn job_from_row(row: &SqliteRow) -> Result<ImportJob> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let status: String = row.get("status");
    let summary: Option<String> = row.get("summary");

    Ok(ImportJob {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Bad job id '{}': {}", id, e)))?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| Error::Internal(format!("Bad user id '{}': {}", user_id, e)))?,
        filename: row.get("filename"),
        status: ImportStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown job status '{}'", status)))?,
        total_rows: row.get("total_rows"),
        processed_rows: row.get("processed_rows"),
        imported_rows: row.get("imported_rows"),
        failed_rows: row.get("failed_rows"),
        warning_rows: row.get("warning_rows"),
        summary: summary
            .map(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| Error::Internal(format!("Bad summary JSON: {}", e)))
            })
            .transpose()?,
        started_at: parse_timestamp(row.get("started_at"))?,
        finished_at: parse_timestamp(row.get("finished_at"))?,
        created_at: parse_timestamp(row.get("created_at"))?
            .ok_or_else(|| Error::Internal("Job missing created_at".to_string()))?,
        updated_at: parse_timestamp(row.get("updated_at"))?
            .ok_or_else(|| Error::Internal("Job missing updated_at".to_string()))?,
    })
}

fn parse_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("Bad timestamp '{}': {}", s, e)))
    })
    .transpose()
}
