//! Identity resolution: find a catalog book key for one row
//!
//! Strategies are tried strictly in order and the chain stops at the
//! first match. On a miss every strategy runs and every outcome is
//! recorded, so the import issue log keeps the full diagnostic trail. A
//! rate-limited strategy does not short-circuit the rest; rate limiting
//! is per-strategy, not global.

use crate::catalog::{CatalogError, CatalogLookup};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Why one lookup strategy ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupReason {
    Matched,
    NotFound,
    UpstreamError,
    RateLimited,
}

/// Result of one identity-resolution strategy
#[derive(Debug, Clone, Serialize)]
pub struct LookupOutcome {
    pub strategy: String,
    pub book_key: Option<String>,
    pub reason: LookupReason,
}

/// One way of looking a row up in the catalog
#[async_trait]
pub trait LookupStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self) -> LookupOutcome;
}

/// Outcome of running a strategy chain for one row
#[derive(Debug, Default)]
pub struct Resolution {
    pub book_key: Option<String>,
    pub outcomes: Vec<LookupOutcome>,
}

/// Run the strategies in order, stopping at the first match
pub async fn resolve(strategies: &[Box<dyn LookupStrategy>]) -> Resolution {
    let mut resolution = Resolution::default();

    for strategy in strategies {
        let outcome = strategy.attempt().await;
        let matched = outcome.reason == LookupReason::Matched;
        if matched {
            resolution.book_key = outcome.book_key.clone();
        }
        resolution.outcomes.push(outcome);
        if matched {
            break;
        }
    }

    resolution
}

fn outcome_for(name: &str, result: Result<Option<String>, CatalogError>) -> LookupOutcome {
    let (book_key, reason) = match result {
        Ok(Some(key)) => (Some(key), LookupReason::Matched),
        Ok(None) | Err(CatalogError::NotFound(_)) => (None, LookupReason::NotFound),
        Err(CatalogError::RateLimited) => (None, LookupReason::RateLimited),
        Err(CatalogError::Upstream(_)) => (None, LookupReason::UpstreamError),
    };
    LookupOutcome {
        strategy: name.to_string(),
        book_key,
        reason,
    }
}

/// Exact-ISBN lookup (used for both the ISBN-13 and ISBN-10 positions
/// in the chain)
pub struct IsbnLookup {
    catalog: Arc<dyn CatalogLookup>,
    name: &'static str,
    isbn: String,
}

impl IsbnLookup {
    pub fn isbn13(catalog: Arc<dyn CatalogLookup>, isbn: String) -> Self {
        Self {
            catalog,
            name: "isbn13",
            isbn,
        }
    }

    pub fn isbn10(catalog: Arc<dyn CatalogLookup>, isbn: String) -> Self {
        Self {
            catalog,
            name: "isbn10",
            isbn,
        }
    }
}

#[async_trait]
impl LookupStrategy for IsbnLookup {
    fn name(&self) -> &str {
        self.name
    }

    async fn attempt(&self) -> LookupOutcome {
        outcome_for(self.name, self.catalog.find_by_isbn(&self.isbn).await)
    }
}

/// Normalized title+author search, the last resort in the chain
pub struct TitleAuthorLookup {
    catalog: Arc<dyn CatalogLookup>,
    title: String,
    author: String,
}

impl TitleAuthorLookup {
    pub fn new(catalog: Arc<dyn CatalogLookup>, title: String, author: String) -> Self {
        Self {
            catalog,
            title,
            author,
        }
    }
}

#[async_trait]
impl LookupStrategy for TitleAuthorLookup {
    fn name(&self) -> &str {
        "title_author"
    }

    async fn attempt(&self) -> LookupOutcome {
        outcome_for(
            "title_author",
            self.catalog
                .search_title_author(&self.title, &self.author)
                .await,
        )
    }
}
