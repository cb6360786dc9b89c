//! Bulk catalog warmer
//!
//! Pre-populates the catalog cache for a list of book keys, outside of
//! any import job. Requests run under a fixed worker-pool degree so the
//! external service is never hit with an unbounded burst.

use crate::catalog::{CatalogCache, CatalogLookup};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome counts for one prefetch run
#[derive(Debug, Default, Clone, Serialize)]
pub struct PrefetchSummary {
    /// Keys fetched from the catalog and written to the cache
    pub warmed: usize,
    /// Keys already cached and unexpired
    pub skipped: usize,
    /// Keys whose fetch or cache write failed
    pub failed: usize,
}

/// Warm the cache for the given keys with at most `concurrency`
/// in-flight fetches
pub async fn prefetch_details(
    catalog: Arc<dyn CatalogLookup>,
    cache: Arc<CatalogCache>,
    book_keys: Vec<String>,
    concurrency: usize,
) -> PrefetchSummary {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(book_keys.len());

    for book_key in book_keys {
        let semaphore = Arc::clone(&semaphore);
        let catalog = Arc::clone(&catalog);
        let cache = Arc::clone(&cache);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");

            match cache.get(&book_key).await {
                Ok(Some(_)) => return PrefetchOutcome::Skipped,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(book_key = %book_key, error = %e, "Cache read failed during prefetch");
                }
            }

            match catalog.fetch_detail(&book_key).await {
                Ok(detail) => match cache.set(&book_key, &detail, None).await {
                    Ok(()) => PrefetchOutcome::Warmed,
                    Err(e) => {
                        tracing::warn!(book_key = %book_key, error = %e, "Cache write failed during prefetch");
                        PrefetchOutcome::Failed
                    }
                },
                Err(e) => {
                    tracing::warn!(book_key = %book_key, error = %e, "Detail fetch failed during prefetch");
                    PrefetchOutcome::Failed
                }
            }
        }));
    }

    let mut summary = PrefetchSummary::default();
    for handle in handles {
        match handle.await {
            Ok(PrefetchOutcome::Warmed) => summary.warmed += 1,
            Ok(PrefetchOutcome::Skipped) => summary.skipped += 1,
            Ok(PrefetchOutcome::Failed) | Err(_) => summary.failed += 1,
        }
    }

    tracing::info!(
        warmed = summary.warmed,
        skipped = summary.skipped,
        failed = summary.failed,
        "Catalog prefetch finished"
    );

    summary
}

enum PrefetchOutcome {
    Warmed,
    Skipped,
    Failed,
}
