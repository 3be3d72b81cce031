//! Forwarded identity extraction
//!
//! Authentication and authorization are terminated upstream; the gateway
//! forwards the authenticated user's id in the `X-User-Id` header. Handlers
//! that write to the ledger require it through the `CurrentUser` extractor
//! so every movement carries the acting user.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated user id forwarded by the gateway
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(CurrentUser)
            .ok_or_else(|| {
                AppError::Unauthorized("Missing or invalid X-User-Id header".to_string())
            })
    }
}
