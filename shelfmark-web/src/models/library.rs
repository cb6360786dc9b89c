//! Library entry models
//!
//! Finished books are reading entries with a non-null `finished_at`;
//! there is no separate "finished" table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user's retained verdict on a finished book, distinct from the
/// source export's numeric rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Accepted,
    Rejected,
}

impl Judgment {
    pub fn as_str(self) -> &'static str {
        match self {
            Judgment::Accepted => "accepted",
            Judgment::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Judgment::Accepted),
            "rejected" => Some(Judgment::Rejected),
            _ => None,
        }
    }
}

/// A currently-reading or finished book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Catalog book key, or a locally-synthesized `local:` key when
    /// identity resolution missed
    pub book_key: String,
    pub title: String,
    pub author: String,
    pub started_at: Option<NaiveDate>,
    pub finished_at: Option<NaiveDate>,
    pub progress_percent: Option<u8>,
    pub judgment: Option<Judgment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A want-to-read book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToReadEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_key: String,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}
