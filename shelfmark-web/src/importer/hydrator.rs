//! Metadata hydration: enrich a resolved book key with detail metadata
//!
//! Hydration is total. A fresh remote fetch (bypassing cache reads, so
//! freshly-imported books get real metadata promptly) either succeeds
//! and is cached, or the cache is seeded with a minimal record built
//! from the row's own title and author. Neither path raises to the
//! caller; missing metadata must never block recording that the user
//! read the book.

use crate::catalog::{BookDetail, CatalogCache, CatalogLookup};
use std::sync::Arc;

/// How hydration completed; both outcomes are successes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// Remote detail fetched and cached
    Hydrated,
    /// Remote fetch failed; minimal cache entry seeded from the row
    FallbackSeeded,
}

pub struct MetadataHydrator {
    catalog: Arc<dyn CatalogLookup>,
    cache: Arc<CatalogCache>,
}

impl MetadataHydrator {
    pub fn new(catalog: Arc<dyn CatalogLookup>, cache: Arc<CatalogCache>) -> Self {
        Self { catalog, cache }
    }

    /// Hydrate one matched identity
    pub async fn hydrate(&self, book_key: &str, title: &str, author: &str) -> HydrationOutcome {
        match self.catalog.fetch_detail(book_key).await {
            Ok(detail) => {
                if let Err(e) = self.cache.set(book_key, &detail, None).await {
                    tracing::warn!(
                        book_key = %book_key,
                        error = %e,
                        "Hydrated detail could not be cached"
                    );
                }
                HydrationOutcome::Hydrated
            }
            Err(e) => {
                tracing::warn!(
                    book_key = %book_key,
                    error = %e,
                    "Detail fetch failed, seeding fallback metadata"
                );
                self.seed_fallback(book_key, title, author).await;
                HydrationOutcome::FallbackSeeded
            }
        }
    }

    /// Seed the minimal cache entry directly (used for locally-synthesized
    /// keys, which the catalog cannot know about)
    pub async fn seed_fallback(&self, book_key: &str, title: &str, author: &str) {
        let fallback = BookDetail::fallback(book_key, title, author);
        if let Err(e) = self.cache.set(book_key, &fallback, None).await {
            tracing::warn!(
                book_key = %book_key,
                error = %e,
                "Fallback metadata could not be cached"
            );
        }
    }
}
