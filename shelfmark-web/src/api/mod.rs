//! API handlers for shelfmark-web

pub mod catalog;
pub mod health;
pub mod imports;
pub mod library;
pub mod sse;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use imports::import_routes;
pub use library::library_routes;

use crate::error::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// The requesting user's id, injected by the upstream auth proxy as an
/// `X-User-Id` header. Requests without a valid header are rejected;
/// authentication itself happens outside this service.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

        let user_id = Uuid::parse_str(header)
            .map_err(|_| ApiError::Unauthorized("X-User-Id is not a valid uuid".to_string()))?;

        Ok(UserId(user_id))
    }
}
