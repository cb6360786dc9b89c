//! Import issue persistence
//!
//! Issues are append-only once written; a redelivered job clears its
//! own issues before re-attempting rows so the log matches the run that
//! produced the final counters.

use crate::models::{ImportIssue, IssueSeverity};
use shelfmark_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Append one issue
pub async fn insert(pool: &SqlitePool, issue: &ImportIssue) -> Result<()> {
    let raw_row = issue
        .raw_row
        .as_ref()
        .map(|v| v.to_string());

    sqlx::query(
        r#"
        INSERT INTO import_issues
            (job_id, row_number, title, author, severity, code, message, inference, raw_row)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(issue.job_id.to_string())
    .bind(issue.row_number)
    .bind(&issue.title)
    .bind(&issue.author)
    .bind(issue.severity.as_str())
    .bind(&issue.code)
    .bind(&issue.message)
    .bind(&issue.inference)
    .bind(raw_row)
    .execute(pool)
    .await?;

    Ok(())
}

/// List a job's issues in row order
pub async fn list_for_job(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<ImportIssue>> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, row_number, title, author, severity, code, message, inference, raw_row
        FROM import_issues
        WHERE job_id = ?
        ORDER BY row_number
        "#,
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(issue_from_row).collect()
}

/// Drop a job's issues before a redelivered run re-attempts its rows
pub async fn clear_for_job(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_issues WHERE job_id = ?")
        .bind(job_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

fn issue_from_row(row: &SqliteRow) -> Result<ImportIssue> {
    let job_id: String = row.get("job_id");
    let severity: String = row.get("severity");
    let raw_row: Option<String> = row.get("raw_row");

    Ok(ImportIssue {
        job_id: Uuid::parse_str(&job_id)
            .map_err(|e| Error::Internal(format!("Bad job id '{}': {}", job_id, e)))?,
        row_number: row.get("row_number"),
        title: row.get("title"),
        author: row.get("author"),
        severity: IssueSeverity::parse(&severity)
            .ok_or_else(|| Error::Internal(format!("Unknown severity '{}'", severity)))?,
        code: row.get("code"),
        message: row.get("message"),
        inference: row.get("inference"),
        raw_row: raw_row
            .map(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| Error::Internal(format!("Bad raw_row JSON: {}", e)))
            })
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn issue(job_id: Uuid, row_number: i64) -> ImportIssue {
        ImportIssue {
            job_id,
            row_number,
            title: "Some Book".to_string(),
            author: "Some Author".to_string(),
            severity: IssueSeverity::Warning,
            code: "INFERRED_START_DATE".to_string(),
            message: "Start date missing".to_string(),
            inference: Some("taken from Date Read".to_string()),
            raw_row: Some(serde_json::json!({"Title": "Some Book"})),
        }
    }

    #[tokio::test]
    async fn issues_round_trip_in_row_order() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        let job_id = Uuid::new_v4();

        insert(&pool, &issue(job_id, 3)).await.unwrap();
        insert(&pool, &issue(job_id, 1)).await.unwrap();

        let issues = list_for_job(&pool, job_id).await.unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].row_number, 1);
        assert_eq!(issues[1].row_number, 3);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert_eq!(issues[0].inference.as_deref(), Some("taken from Date Read"));
    }

    #[tokio::test]
    async fn row_numbers_are_unique_within_a_job() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        let job_id = Uuid::new_v4();

        insert(&pool, &issue(job_id, 1)).await.unwrap();
        assert!(insert(&pool, &issue(job_id, 1)).await.is_err());
        // Same row number under a different job is fine
        insert(&pool, &issue(Uuid::new_v4(), 1)).await.unwrap();
    }

    #[tokio::test]
    async fn clear_removes_only_that_jobs_issues() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        let (job_a, job_b) = (Uuid::new_v4(), Uuid::new_v4());

        insert(&pool, &issue(job_a, 1)).await.unwrap();
        insert(&pool, &issue(job_b, 1)).await.unwrap();

        clear_for_job(&pool, job_a).await.unwrap();

        assert!(list_for_job(&pool, job_a).await.unwrap().is_empty());
        assert_eq!(list_for_job(&pool, job_b).await.unwrap().len(), 1);
    }
}
