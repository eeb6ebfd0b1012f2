//! Workflow endpoints
//!
//! Lifecycle (get/list/upsert/delete) plus the advisory helpers backed by
//! the run-sample cache: expression validation, schema generation, and the
//! deterministic instruction summary.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use splice_db::{ConfigRecord, EntityKind, Page, Pagination};
use splice_domain::Workflow;
use splice_engine::{describe_workflow, MappingOutcome};

use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

/// Query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit.unwrap_or(20), self.offset.unwrap_or(0))
    }
}

/// Request to validate a candidate mapping expression
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExpressionRequest {
    pub expression: String,
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_workflow(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let record = state
        .store
        .get_config(EntityKind::Workflow, &id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{id}'")))?;
    Ok(Json(hydrate(record)?))
}

async fn list_workflows(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Workflow>>, ApiError> {
    let page = state
        .store
        .list_configs(EntityKind::Workflow, &query.pagination(), &tenant)
        .await?;
    let page = page.filter_map(|record| hydrate(record).ok());
    Ok(Json(page))
}

async fn upsert_workflow(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(mut workflow): Json<Workflow>,
) -> Result<Json<Workflow>, ApiError> {
    workflow.id = splice_db::decode_id(&id);
    if workflow.steps.is_empty() {
        return Err(ApiError::BadRequest("workflow has no steps".to_string()));
    }
    if let Some(duplicate) = workflow.duplicate_step_id() {
        return Err(ApiError::BadRequest(format!(
            "duplicate step id '{duplicate}'"
        )));
    }

    // Timestamps are server-assigned; strip whatever the caller sent
    workflow.created_at = None;
    workflow.updated_at = None;
    let payload = serde_json::to_value(&workflow)
        .map_err(|e| ApiError::Internal(format!("workflow not serializable: {e}")))?;

    let record = state
        .store
        .upsert_config(EntityKind::Workflow, &workflow.id, payload, &tenant)
        .await?;
    Ok(Json(hydrate(record)?))
}

async fn delete_workflow(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state
        .store
        .delete_config(EntityKind::Workflow, &id, &tenant)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("workflow '{id}'")));
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

/// Evaluate a candidate expression against the workflow's cached run sample
async fn validate_expression(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<ValidateExpressionRequest>,
) -> Result<Json<MappingOutcome>, ApiError> {
    let id = splice_db::decode_id(&id);
    let outcome = state
        .samples
        .validate_expression(
            tenant.storage_key(),
            &id,
            &request.expression,
            request.schema.as_ref(),
            &state.schemas,
        )
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "workflow '{id}' has no recorded sample; execute it first"
            ))
        })?;
    Ok(Json(outcome))
}

/// Infer a response schema from the workflow's cached run sample
async fn generate_schema(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<splice_engine::schema::SchemaInferenceResult>, ApiError> {
    let record = state
        .store
        .get_config(EntityKind::Workflow, &id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{id}'")))?;
    let workflow = hydrate(record)?;

    let inferred = state
        .samples
        .infer_schema(
            tenant.storage_key(),
            &workflow.id,
            workflow.final_transform(),
            &state.schemas,
        )
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "workflow '{}' has no recorded sample; execute it first",
                workflow.id
            ))
        })?;
    Ok(Json(inferred))
}

/// Deterministic English summary of the workflow's steps
async fn instructions(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .store
        .get_config(EntityKind::Workflow, &id, &tenant)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("workflow '{id}'")))?;
    let workflow = hydrate(record)?;
    Ok(Json(serde_json::json!({
        "instructions": describe_workflow(&workflow)
    })))
}

/// Rebuild a Workflow from its stored record, restoring the indexed columns
fn hydrate(record: ConfigRecord) -> Result<Workflow, ApiError> {
    let mut workflow: Workflow = serde_json::from_value(record.payload)
        .map_err(|e| ApiError::Internal(format!("stored workflow is not valid: {e}")))?;
    workflow.id = record.id;
    workflow.created_at = Some(record.created_at);
    workflow.updated_at = Some(record.updated_at);
    Ok(workflow)
}

// =============================================================================
// Router
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows))
        .route(
            "/{id}",
            get(get_workflow).post(upsert_workflow).delete(delete_workflow),
        )
        .route("/{id}/validate-expression", post(validate_expression))
        .route("/{id}/generate-schema", post(generate_schema))
        .route("/{id}/instructions", get(instructions))
}
