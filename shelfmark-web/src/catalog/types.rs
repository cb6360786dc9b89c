//! Catalog record types

use serde::{Deserialize, Serialize};

/// Descriptive metadata for one catalog work
///
/// This is the shape stored in the catalog cache. A fallback-seeded
/// entry carries only the row's own title and a single author, with
/// publish date and covers left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDetail {
    pub book_key: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub covers: Vec<i64>,
}

impl BookDetail {
    /// Minimal record seeded from a CSV row when the remote detail
    /// fetch fails
    pub fn fallback(book_key: &str, title: &str, author: &str) -> Self {
        Self {
            book_key: book_key.to_string(),
            title: title.to_string(),
            authors: vec![author.to_string()],
            publish_date: None,
            covers: Vec::new(),
        }
    }
}
