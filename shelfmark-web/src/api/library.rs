//! Read-only library listings
//!
//! GET /api/library/reading, GET /api/library/to-read

use axum::{extract::State, routing::get, Json, Router};

use crate::api::UserId;
use crate::db::library;
use crate::error::ApiResult;
use crate::models::{ReadingEntry, ToReadEntry};
use crate::AppState;

/// GET /api/library/reading
pub async fn list_reading(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<ReadingEntry>>> {
    let entries = library::list_reading_for_user(&state.db, user_id).await?;
    Ok(Json(entries))
}

/// GET /api/library/to-read
pub async fn list_to_read(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<ToReadEntry>>> {
    let entries = library::list_to_read_for_user(&state.db, user_id).await?;
    Ok(Json(entries))
}

/// Build library routes
pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/api/library/reading", get(list_reading))
        .route("/api/library/to-read", get(list_to_read))
}
