//! Opaque config endpoints (extract and transform configs)
//!
//! Extract and transform configs share the generic id/payload/timestamps
//! lifecycle but their execution modes live outside this service, so their
//! payloads pass through unparsed.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use splice_db::{ConfigRecord, EntityKind, Page};

use super::workflows::ListQuery;
use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

/// An opaque stored config
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueConfig {
    pub id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConfigRecord> for OpaqueConfig {
    fn from(record: ConfigRecord) -> Self {
        Self {
            id: record.id,
            payload: record.payload,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

async fn get_config(
    kind: EntityKind,
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<OpaqueConfig>, ApiError> {
    let record = state
        .store
        .get_config(kind, &id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} config '{id}'", kind.as_str())))?;
    Ok(Json(record.into()))
}

async fn list_configs(
    kind: EntityKind,
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<OpaqueConfig>>, ApiError> {
    let page = state
        .store
        .list_configs(kind, &query.pagination(), &tenant)
        .await?;
    Ok(Json(page.map(OpaqueConfig::from)))
}

async fn upsert_config(
    kind: EntityKind,
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<OpaqueConfig>, ApiError> {
    if !payload.is_object() {
        return Err(ApiError::BadRequest(
            "config payload must be a JSON object".to_string(),
        ));
    }
    let record = state
        .store
        .upsert_config(kind, &id, payload, &tenant)
        .await?;
    Ok(Json(record.into()))
}

async fn delete_config(
    kind: EntityKind,
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.store.delete_config(kind, &id, &tenant).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!(
            "{} config '{id}'",
            kind.as_str()
        )));
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

pub fn routes(kind: EntityKind) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(
                move |state: State<AppState>, tenant: Tenant, query: Query<ListQuery>| {
                    list_configs(kind, state, tenant, query)
                },
            ),
        )
        .route(
            "/{id}",
            get(
                move |state: State<AppState>, tenant: Tenant, path: Path<String>| {
                    get_config(kind, state, tenant, path)
                },
            )
            .post(
                move |state: State<AppState>,
                      tenant: Tenant,
                      path: Path<String>,
                      body: Json<serde_json::Value>| {
                    upsert_config(kind, state, tenant, path, body)
                },
            )
            .delete(
                move |state: State<AppState>, tenant: Tenant, path: Path<String>| {
                    delete_config(kind, state, tenant, path)
                },
            ),
        )
}
