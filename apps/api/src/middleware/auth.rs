//! Authentication middleware
//!
//! Every request must present the configured bearer token; failures are
//! rejected at the gateway before any handler runs. The tenant id comes
//! from the `X-Tenant-Id` header — its absence means the admin scope,
//! which matches records written under any tenant.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use splice_db::TenantScope;

use crate::{ApiError, AppState};

const TENANT_HEADER: &str = "x-tenant-id";

/// Validate the bearer token and attach the tenant scope to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if token != state.config.auth_token {
        return Err(ApiError::Unauthorized);
    }

    let scope = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(TenantScope::of)
        .unwrap_or_else(TenantScope::admin);

    request.extensions_mut().insert(scope);
    Ok(next.run(request).await)
}
