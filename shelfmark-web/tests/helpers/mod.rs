//! Shared test fixtures: a scripted catalog double and app builders
#![allow(dead_code)]

use async_trait::async_trait;
use shelfmark_common::config::TomlConfig;
use shelfmark_web::catalog::{BookDetail, CatalogCache, CatalogError, CatalogLookup};
use shelfmark_web::AppState;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted catalog: lookups answer from fixed maps and every call is
/// recorded for ordering assertions
#[derive(Default)]
pub struct StubCatalog {
    /// isbn -> book key
    pub isbn_matches: HashMap<String, String>,
    /// title -> book key
    pub title_matches: HashMap<String, String>,
    /// isbns whose lookup fails upstream
    pub isbn_upstream_errors: HashSet<String>,
    /// book keys whose detail fetch fails upstream
    pub detail_failures: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl StubCatalog {
    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CatalogLookup for StubCatalog {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<String>, CatalogError> {
        self.record(format!("isbn:{}", isbn));
        if self.isbn_upstream_errors.contains(isbn) {
            return Err(CatalogError::Upstream("stubbed outage".into()));
        }
        Ok(self.isbn_matches.get(isbn).cloned())
    }

    async fn search_title_author(
        &self,
        title: &str,
        _author: &str,
    ) -> Result<Option<String>, CatalogError> {
        self.record(format!("search:{}", title));
        Ok(self.title_matches.get(title).cloned())
    }

    async fn fetch_detail(&self, book_key: &str) -> Result<BookDetail, CatalogError> {
        self.record(format!("detail:{}", book_key));
        if self.detail_failures.contains(book_key) {
            return Err(CatalogError::Upstream("stubbed outage".into()));
        }
        Ok(BookDetail {
            book_key: book_key.to_string(),
            title: format!("Catalog Title for {}", book_key),
            authors: vec!["Catalog Author".to_string()],
            publish_date: Some("1974".to_string()),
            covers: vec![1],
        })
    }
}

/// In-memory app state around a scripted catalog
pub async fn test_state(catalog: Arc<dyn CatalogLookup>, config: TomlConfig) -> AppState {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    shelfmark_web::db::init_tables(&pool)
        .await
        .expect("Failed to initialize schema");

    let cache = Arc::new(CatalogCache::new(pool.clone(), Duration::from_secs(3600)));
    AppState::new(pool, catalog, cache, Arc::new(config))
}

/// A small, well-formed export covering all three shelves
pub fn sample_csv() -> &'static [u8] {
    b"Title,Author,ISBN,ISBN13,My Rating,Exclusive Shelf,Date Read,Date Added\n\
      The Dispossessed,Ursula K. Le Guin,=\"0060512751\",=\"9780060512750\",4,read,2026/02/07,\n\
      Always Coming Home,Ursula K. Le Guin,=\"\",=\"9780520227354\",0,currently-reading,,2026/01/15\n\
      The Lathe of Heaven,Ursula K. Le Guin,=\"\"\"\",=\"\"\"\",0,to-read,,2026/03/01\n"
}
