//! shelfmark-web library interface
//!
//! Exposes the application state, router, and pipeline components for
//! integration testing.

pub mod api;
pub mod catalog;
pub mod db;
pub mod error;
pub mod importer;
pub mod models;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use catalog::{CatalogCache, CatalogLookup};
use chrono::{DateTime, Utc};
use shelfmark_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// External catalog client (trait object so tests can inject a double)
    pub catalog: Arc<dyn CatalogLookup>,
    /// Two-tier catalog detail cache
    pub cache: Arc<CatalogCache>,
    /// Loaded configuration
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
    /// Shutdown signal shared with the import worker
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        catalog: Arc<dyn CatalogLookup>,
        cache: Arc<CatalogCache>,
        config: Arc<TomlConfig>,
    ) -> Self {
        Self {
            db,
            catalog,
            cache,
            config,
            startup_time: Utc::now(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Headroom over the upload cap for multipart framing; the handler
    // enforces the real per-file limit while streaming
    let body_limit = state.config.import.max_upload_bytes + 64 * 1024;

    Router::new()
        .merge(api::import_routes())
        .merge(api::library_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
