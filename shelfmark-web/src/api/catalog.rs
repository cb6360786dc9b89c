//! Catalog cache warming
//!
//! POST /api/catalog/prefetch: the bulk-lookup path that pre-populates
//! catalog metadata outside of any import job.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::UserId;
use crate::catalog::prefetch::{prefetch_details, PrefetchSummary};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MAX_PREFETCH_KEYS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct PrefetchRequest {
    pub book_keys: Vec<String>,
}

/// POST /api/catalog/prefetch
pub async fn prefetch(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<PrefetchRequest>,
) -> ApiResult<Json<PrefetchSummary>> {
    if request.book_keys.is_empty() {
        return Err(ApiError::BadRequest("book_keys is empty".to_string()));
    }
    if request.book_keys.len() > MAX_PREFETCH_KEYS {
        return Err(ApiError::BadRequest(format!(
            "At most {} keys per prefetch request",
            MAX_PREFETCH_KEYS
        )));
    }

    tracing::info!(
        user_id = %user_id,
        keys = request.book_keys.len(),
        "Catalog prefetch requested"
    );

    let summary = prefetch_details(
        Arc::clone(&state.catalog),
        Arc::clone(&state.cache),
        request.book_keys,
        state.config.catalog.prefetch_concurrency,
    )
    .await;

    Ok(Json(summary))
}

/// Build catalog routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/api/catalog/prefetch", post(prefetch))
}
