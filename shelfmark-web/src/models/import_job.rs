//! Import job state machine
//!
//! A job progresses QUEUED → PROCESSING → {COMPLETED | COMPLETED_WITH_ERRORS | FAILED}.
//! Terminal states are final; `finished_at` is set exactly once, on the
//! transition into a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// Created at upload time, waiting for the worker
    Queued,
    /// Claimed by the worker, rows being processed
    Processing,
    /// Ran to the end with zero failed rows
    Completed,
    /// Ran to the end with at least one failed row
    CompletedWithErrors,
    /// Aborted before finishing all rows (envelope error or abandoned by the queue)
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImportStatus::Completed | ImportStatus::CompletedWithErrors | ImportStatus::Failed
        )
    }

    /// Column value used in the `import_jobs` table
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Queued => "queued",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::CompletedWithErrors => "completed_with_errors",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ImportStatus::Queued),
            "processing" => Some(ImportStatus::Processing),
            "completed" => Some(ImportStatus::Completed),
            "completed_with_errors" => Some(ImportStatus::CompletedWithErrors),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }
}

/// One import job: the durable record the worker mutates and the status
/// publisher reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub imported_rows: i64,
    pub failed_rows: i64,
    pub warning_rows: i64,
    /// Free-form terminal summary (counts, duration)
    pub summary: Option<serde_json::Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(IssueSeverity::Warning),
            "error" => Some(IssueSeverity::Error),
            _ => None,
        }
    }
}

/// One per-row warning or error recorded during import, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    pub job_id: Uuid,
    /// 1-based data row number (the header is row 0)
    pub row_number: i64,
    /// Raw title/author from the row, kept for display even when
    /// resolution failed
    pub title: String,
    pub author: String,
    pub severity: IssueSeverity,
    pub code: String,
    pub message: String,
    /// Free-text explanation of an inferred value, if any
    pub inference: Option<String>,
    /// Copy of the raw row for debugging
    pub raw_row: Option<serde_json::Value>,
}

/// Machine-readable issue codes
pub mod codes {
    pub const INFERRED_START_DATE: &str = "INFERRED_START_DATE";
    pub const MISSING_START_DATE: &str = "MISSING_START_DATE";
    pub const INVALID_DATE_FORMAT: &str = "INVALID_DATE_FORMAT";
    pub const UNKNOWN_SHELF: &str = "UNKNOWN_SHELF";
    pub const MISSING_TITLE: &str = "MISSING_TITLE";
    pub const INVALID_RATING: &str = "INVALID_RATING";
    pub const INVALID_ISBN: &str = "INVALID_ISBN";
    pub const NO_MATCH_FOUND: &str = "NO_MATCH_FOUND";
    pub const LOOKUP_UPSTREAM_ERROR: &str = "LOOKUP_UPSTREAM_ERROR";
    pub const LOOKUP_RATE_LIMITED: &str = "LOOKUP_RATE_LIMITED";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_value() {
        for status in [
            ImportStatus::Queued,
            ImportStatus::Processing,
            ImportStatus::Completed,
            ImportStatus::CompletedWithErrors,
            ImportStatus::Failed,
        ] {
            assert_eq!(ImportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ImportStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!ImportStatus::Queued.is_terminal());
        assert!(!ImportStatus::Processing.is_terminal());
        assert!(ImportStatus::Completed.is_terminal());
        assert!(ImportStatus::CompletedWithErrors.is_terminal());
        assert!(ImportStatus::Failed.is_terminal());
    }
}
