//! Run result endpoints
//!
//! Runs are written once by the executor and immutable afterwards; this
//! surface reads them back and supports per-tenant bulk deletion.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use splice_db::{Page, Pagination, RunRecord};
use splice_domain::RunResult;

use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsQuery {
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

async fn get_run(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<RunResult>, ApiError> {
    let id: Uuid = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("'{id}' is not a run id")))?;
    let record = state
        .store
        .get_run(id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run '{id}'")))?;
    Ok(Json(hydrate(record)?))
}

async fn list_runs(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Page<RunResult>>, ApiError> {
    let pagination = Pagination::new(query.limit.unwrap_or(20), query.offset.unwrap_or(0));
    let page = state
        .store
        .list_runs(&pagination, query.config_id.as_deref(), &tenant)
        .await?;
    Ok(Json(page.filter_map(|record| hydrate(record).ok())))
}

async fn delete_all_runs(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.store.delete_all_runs(&tenant).await?;
    Ok(Json(serde_json::json!({"deleted": deleted})))
}

fn hydrate(record: RunRecord) -> Result<RunResult, ApiError> {
    serde_json::from_value(record.payload)
        .map_err(|e| ApiError::Internal(format!("stored run is not valid: {e}")))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_runs).delete(delete_all_runs))
        .route("/{id}", get(get_run))
}
