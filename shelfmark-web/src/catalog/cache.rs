//! Two-tier read-through cache for catalog detail records
//!
//! The durable tier (`catalog_cache` table) is the source of truth; the
//! volatile tier is an in-process accelerator in front of it. A miss in
//! the volatile tier falls through to the durable tier and promotes the
//! hit, so the cache stays correct when the volatile tier never hits.
//! Entries carry their own expiry.

use crate::catalog::types::BookDetail;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CachedDetail {
    detail: BookDetail,
    expires_at: i64,
}

/// Read-through catalog cache
pub struct CatalogCache {
    db: SqlitePool,
    volatile: moka::sync::Cache<String, CachedDetail>,
    default_ttl: Duration,
}

impl CatalogCache {
    pub fn new(db: SqlitePool, default_ttl: Duration) -> Self {
        Self {
            db,
            volatile: moka::sync::Cache::builder().max_capacity(10_000).build(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a detail record; None when absent or expired in both tiers
    pub async fn get(&self, book_key: &str) -> shelfmark_common::Result<Option<BookDetail>> {
        let now = Utc::now().timestamp();

        if let Some(cached) = self.volatile.get(book_key) {
            if cached.expires_at > now {
                return Ok(Some(cached.detail));
            }
            self.volatile.invalidate(book_key);
        }

        let row = sqlx::query(
            "SELECT detail, expires_at FROM catalog_cache WHERE book_key = ? AND expires_at > ?",
        )
        .bind(book_key)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let detail: String = row.get("detail");
                let expires_at: i64 = row.get("expires_at");
                let detail: BookDetail = serde_json::from_str(&detail).map_err(|e| {
                    shelfmark_common::Error::Internal(format!(
                        "Failed to deserialize cached detail for {}: {}",
                        book_key, e
                    ))
                })?;

                self.volatile.insert(
                    book_key.to_string(),
                    CachedDetail {
                        detail: detail.clone(),
                        expires_at,
                    },
                );
                Ok(Some(detail))
            }
            None => Ok(None),
        }
    }

    /// Store a detail record in both tiers with the given TTL
    ///
    /// The durable write happens first; the volatile insert cannot fail.
    pub async fn set(
        &self,
        book_key: &str,
        detail: &BookDetail,
        ttl: Option<Duration>,
    ) -> shelfmark_common::Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let json = serde_json::to_string(detail).map_err(|e| {
            shelfmark_common::Error::Internal(format!("Failed to serialize detail: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO catalog_cache (book_key, detail, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(book_key) DO UPDATE SET
                detail = excluded.detail,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(book_key)
        .bind(&json)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        self.volatile.insert(
            book_key.to_string(),
            CachedDetail {
                detail: detail.clone(),
                expires_at,
            },
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_cache() -> CatalogCache {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        CatalogCache::new(pool, Duration::from_secs(3600))
    }

    fn detail(key: &str) -> BookDetail {
        BookDetail {
            book_key: key.to_string(),
            title: "The Dispossessed".to_string(),
            authors: vec!["Ursula K. Le Guin".to_string()],
            publish_date: Some("1974".to_string()),
            covers: vec![42],
        }
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = test_cache().await;
        assert_eq!(cache.get("OL1W").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = test_cache().await;
        cache.set("OL1W", &detail("OL1W"), None).await.unwrap();
        assert_eq!(cache.get("OL1W").await.unwrap(), Some(detail("OL1W")));
    }

    #[tokio::test]
    async fn durable_tier_survives_volatile_loss() {
        let cache = test_cache().await;
        cache.set("OL1W", &detail("OL1W"), None).await.unwrap();

        // Simulate the volatile tier being wiped entirely
        cache.volatile.invalidate_all();

        assert_eq!(cache.get("OL1W").await.unwrap(), Some(detail("OL1W")));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = test_cache().await;
        cache
            .set("OL1W", &detail("OL1W"), Some(Duration::from_secs(0)))
            .await
            .unwrap();
        assert_eq!(cache.get("OL1W").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_existing_entry() {
        let cache = test_cache().await;
        cache.set("OL1W", &detail("OL1W"), None).await.unwrap();

        let updated = BookDetail {
            title: "The Dispossessed (revised)".to_string(),
            ..detail("OL1W")
        };
        cache.set("OL1W", &updated, None).await.unwrap();

        assert_eq!(cache.get("OL1W").await.unwrap(), Some(updated));
    }
}
