//! Tenant scope extractor
//!
//! Reads the [`TenantScope`] the auth middleware attached to the request.
//! A request that reaches a handler without one did not pass through the
//! auth layer and is rejected.

use axum::{extract::FromRequestParts, http::request::Parts};

use splice_db::TenantScope;

use crate::ApiError;

/// The tenant scope of an authenticated request
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantScope);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantScope>()
            .cloned()
            .map(Tenant)
            .ok_or(ApiError::Unauthorized)
    }
}
