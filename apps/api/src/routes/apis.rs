//! API config endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use splice_db::{ConfigRecord, EntityKind, Page};
use splice_domain::ApiConfig;

use super::workflows::ListQuery;
use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

/// Request to move an API config to a new id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub new_id: String,
}

async fn get_api(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<ApiConfig>, ApiError> {
    let record = state
        .store
        .get_config(EntityKind::Api, &id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("api config '{id}'")))?;
    Ok(Json(hydrate(record)?))
}

async fn list_apis(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<ApiConfig>>, ApiError> {
    let page = state
        .store
        .list_configs(EntityKind::Api, &query.pagination(), &tenant)
        .await?;
    Ok(Json(page.filter_map(|record| hydrate(record).ok())))
}

async fn upsert_api(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(mut config): Json<ApiConfig>,
) -> Result<Json<ApiConfig>, ApiError> {
    config.id = splice_db::decode_id(&id);
    if config.url_host.is_empty() {
        return Err(ApiError::BadRequest(
            "api config requires a urlHost".to_string(),
        ));
    }

    config.created_at = None;
    config.updated_at = None;
    let payload = serde_json::to_value(&config)
        .map_err(|e| ApiError::Internal(format!("api config not serializable: {e}")))?;

    let record = state
        .store
        .upsert_config(EntityKind::Api, &config.id, payload, &tenant)
        .await?;
    Ok(Json(hydrate(record)?))
}

async fn delete_api(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state
        .store
        .delete_config(EntityKind::Api, &id, &tenant)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("api config '{id}'")));
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

/// Move an API config to a new id, keeping its payload
async fn rename_api(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(old_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<ApiConfig>, ApiError> {
    if request.new_id.trim().is_empty() {
        return Err(ApiError::BadRequest("newId must not be empty".to_string()));
    }
    let record = state
        .store
        .rename_config(EntityKind::Api, &old_id, &request.new_id, &tenant)
        .await?;
    Ok(Json(hydrate(record)?))
}

fn hydrate(record: ConfigRecord) -> Result<ApiConfig, ApiError> {
    let mut config: ApiConfig = serde_json::from_value(record.payload)
        .map_err(|e| ApiError::Internal(format!("stored api config is not valid: {e}")))?;
    config.id = record.id;
    config.created_at = Some(record.created_at);
    config.updated_at = Some(record.updated_at);
    Ok(config)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_apis))
        .route("/{id}", get(get_api).post(upsert_api).delete(delete_api))
        .route("/{id}/rename", post(rename_api))
}
