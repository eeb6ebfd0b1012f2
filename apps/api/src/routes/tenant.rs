//! Tenant info endpoints

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};

use splice_domain::TenantInfo;

use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

async fn get_tenant_info(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Json<TenantInfo>, ApiError> {
    let info = state.store.get_tenant_info(&tenant).await?;
    Ok(Json(info))
}

async fn update_tenant_info(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(info): Json<TenantInfo>,
) -> Result<Json<TenantInfo>, ApiError> {
    let stored = state.store.upsert_tenant_info(&info, &tenant).await?;
    Ok(Json(stored))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_tenant_info).put(update_tenant_info))
}
