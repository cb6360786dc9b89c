//! Library entry persistence
//!
//! Entries are upserted on (user_id, book_key) so a redelivered job
//! re-writing the same rows converges instead of duplicating.

use crate::models::{Judgment, ReadingEntry, ToReadEntry};
use chrono::{DateTime, NaiveDate, Utc};
use shelfmark_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Insert or update a currently-reading/finished entry
pub async fn upsert_reading(pool: &SqlitePool, entry: &ReadingEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reading_entries
            (id, user_id, book_key, title, author, started_at, finished_at,
             progress_percent, judgment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, book_key) DO UPDATE SET
            title = excluded.title,
            author = excluded.author,
            started_at = excluded.started_at,
            finished_at = excluded.finished_at,
            progress_percent = excluded.progress_percent,
            judgment = excluded.judgment,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.user_id.to_string())
    .bind(&entry.book_key)
    .bind(&entry.title)
    .bind(&entry.author)
    .bind(entry.started_at.map(|d| d.format(DATE_FORMAT).to_string()))
    .bind(entry.finished_at.map(|d| d.format(DATE_FORMAT).to_string()))
    .bind(entry.progress_percent.map(|p| p as i64))
    .bind(entry.judgment.map(|j| j.as_str()))
    .bind(entry.created_at.to_rfc3339())
    .bind(entry.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or refresh a want-to-read entry
pub async fn upsert_to_read(pool: &SqlitePool, entry: &ToReadEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO to_read_entries (id, user_id, book_key, title, author, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, book_key) DO UPDATE SET
            title = excluded.title,
            author = excluded.author
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.user_id.to_string())
    .bind(&entry.book_key)
    .bind(&entry.title)
    .bind(&entry.author)
    .bind(entry.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// A user's reading entries, most recently updated first
pub async fn list_reading_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ReadingEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, book_key, title, author, started_at, finished_at,
               progress_percent, judgment, created_at, updated_at
        FROM reading_entries
        WHERE user_id = ?
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(reading_from_row).collect()
}

/// A user's want-to-read entries, newest first
pub async fn list_to_read_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ToReadEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, book_key, title, author, created_at
        FROM to_read_entries
        WHERE user_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(to_read_from_row).collect()
}

fn reading_from_row(row: &SqliteRow) -> Result<ReadingEntry> {
    let judgment: Option<String> = row.get("judgment");
    let judgment = judgment
        .map(|s| {
            Judgment::parse(&s).ok_or_else(|| Error::Internal(format!("Unknown judgment '{}'", s)))
        })
        .transpose()?;
    let progress: Option<i64> = row.get("progress_percent");

    Ok(ReadingEntry {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        book_key: row.get("book_key"),
        title: row.get("title"),
        author: row.get("author"),
        started_at: parse_date(row.get("started_at"))?,
        finished_at: parse_date(row.get("finished_at"))?,
        progress_percent: progress.map(|p| p as u8),
        judgment,
        created_at: parse_datetime(row.get("created_at"))?,
        updated_at: parse_datetime(row.get("updated_at"))?,
    })
}

fn to_read_from_row(row: &SqliteRow) -> Result<ToReadEntry> {
    Ok(ToReadEntry {
        id: parse_uuid(row.get("id"))?,
        user_id: parse_uuid(row.get("user_id"))?,
        book_key: row.get("book_key"),
        title: row.get("title"),
        author: row.get("author"),
        created_at: parse_datetime(row.get("created_at"))?,
    })
}

fn parse_uuid(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| Error::Internal(format!("Bad uuid '{}': {}", raw, e)))
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| Error::Internal(format!("Bad date '{}': {}", s, e)))
    })
    .transpose()
}

fn parse_datetime(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp '{}': {}", raw, e)))
}
