//! HTTP client for the external book catalog
//!
//! All outbound calls share one rate limiter (catalog policy: one
//! request per second) and explicit connect/total timeouts. A timed-out
//! or failed call surfaces as `CatalogError::Upstream`, never hangs the
//! worker.

use crate::catalog::types::BookDetail;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shelfmark_common::config::CatalogConfig;
use std::num::NonZeroU32;
use thiserror::Error;

/// Catalog call failure modes
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog resource not found: {0}")]
    NotFound(String),

    #[error("catalog rate limit exceeded")]
    RateLimited,

    #[error("catalog upstream error: {0}")]
    Upstream(String),
}

/// Read-only catalog operations the import pipeline depends on
///
/// A trait seam so the worker and its tests can run against a scripted
/// double instead of the network.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Exact-identifier lookup; Ok(None) when the ISBN is unknown
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<String>, CatalogError>;

    /// Normalized title+author search; Ok(None) when nothing plausible
    async fn search_title_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Option<String>, CatalogError>;

    /// Fetch the full detail record for a known book key
    async fn fetch_detail(&self, book_key: &str) -> Result<BookDetail, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct IsbnRecord {
    #[serde(default)]
    works: Vec<WorkRef>,
}

#[derive(Debug, Deserialize)]
struct WorkRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WorkRecord {
    title: String,
    #[serde(default)]
    author_names: Vec<String>,
    #[serde(default)]
    first_publish_date: Option<String>,
    #[serde(default)]
    covers: Vec<i64>,
}

/// Catalog HTTP client
pub struct CatalogClient {
    client: Client,
    base_url: String,
    user_agent: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl CatalogClient {
    /// Build a client from catalog configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed or the
    /// configured rate limit is zero.
    pub fn new(config: &CatalogConfig) -> shelfmark_common::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| {
                shelfmark_common::Error::Config(format!("Failed to build HTTP client: {}", e))
            })?;

        let per_sec = NonZeroU32::new(config.rate_limit_per_sec).ok_or_else(|| {
            shelfmark_common::Error::Config("catalog.rate_limit_per_sec must be nonzero".into())
        })?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_sec));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            rate_limiter,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, CatalogError> {
        // Enforce the per-second quota before the request goes out
        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %url, "Querying catalog");

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(format!("request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(CatalogError::RateLimited),
            status if status.is_success() => {
                let body = response
                    .json::<T>()
                    .await
                    .map_err(|e| CatalogError::Upstream(format!("malformed response: {}", e)))?;
                Ok(Some(body))
            }
            status => Err(CatalogError::Upstream(format!("status {}", status))),
        }
    }
}

/// Strip the catalog's path prefix so book keys stay opaque identifiers
fn bare_key(key: &str) -> String {
    key.trim_start_matches("/works/").to_string()
}

#[async_trait]
impl CatalogLookup for CatalogClient {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<String>, CatalogError> {
        let url = format!("{}/isbn/{}.json", self.base_url, isbn);
        let record: Option<IsbnRecord> = self.get_json(&url).await?;
        Ok(record
            .and_then(|r| r.works.into_iter().next())
            .map(|w| bare_key(&w.key)))
    }

    async fn search_title_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Option<String>, CatalogError> {
        let url = format!(
            "{}/search.json?title={}&author={}&limit=1",
            self.base_url,
            urlencode(title),
            urlencode(author)
        );
        let response: Option<SearchResponse> = self.get_json(&url).await?;
        Ok(response
            .and_then(|r| r.docs.into_iter().next())
            .map(|d| bare_key(&d.key)))
    }

    async fn fetch_detail(&self, book_key: &str) -> Result<BookDetail, CatalogError> {
        let url = format!("{}/works/{}.json", self.base_url, book_key);
        let record: Option<WorkRecord> = self.get_json(&url).await?;
        let record = record.ok_or_else(|| CatalogError::NotFound(book_key.to_string()))?;

        Ok(BookDetail {
            book_key: book_key.to_string(),
            title: record.title,
            authors: record.author_names,
            publish_date: record.first_publish_date,
            covers: record.covers,
        })
    }
}

/// Minimal percent-encoding for query values
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CatalogConfig {
        CatalogConfig {
            base_url: "https://catalog.example/".to_string(),
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn client_strips_trailing_slash() {
        let client = CatalogClient::new(&test_config()).unwrap();
        assert_eq!(client.base_url, "https://catalog.example");
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = CatalogConfig {
            rate_limit_per_sec: 0,
            ..test_config()
        };
        assert!(CatalogClient::new(&config).is_err());
    }

    #[test]
    fn bare_key_strips_works_prefix() {
        assert_eq!(bare_key("/works/OL45883W"), "OL45883W");
        assert_eq!(bare_key("OL45883W"), "OL45883W");
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("The Left Hand"), "The+Left+Hand");
        assert_eq!(urlencode("Müller & Sons"), "M%C3%BCller+%26+Sons");
    }

    #[tokio::test]
    async fn rate_limiter_delays_second_permit() {
        let client = CatalogClient::new(&test_config()).unwrap();

        let start = std::time::Instant::now();
        client.rate_limiter.until_ready().await;
        assert!(start.elapsed().as_millis() < 100);

        let start = std::time::Instant::now();
        client.rate_limiter.until_ready().await;
        assert!(start.elapsed().as_millis() >= 900);
    }
}
