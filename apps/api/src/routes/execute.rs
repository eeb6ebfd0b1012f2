//! Workflow execution endpoint
//!
//! Accepts an inline workflow or a stored workflow id, a payload, and
//! credentials; payload and credentials may arrive as JSON objects or as
//! JSON-encoded strings. Input-shape violations are rejected before the
//! executor is invoked; every runtime outcome comes back as a RunResult.

use axum::{extract::State, Json};
use serde::Deserialize;

use splice_db::EntityKind;
use splice_domain::{RunOptions, RunResult, Workflow};

use crate::extractors::Tenant;
use crate::state::AppState;
use crate::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Inline workflow definition; mutually exclusive with `workflowId`
    #[serde(default)]
    pub workflow: Option<Workflow>,
    /// Id of a stored workflow to execute
    #[serde(default)]
    pub workflow_id: Option<String>,
    /// JSON object, or a JSON-encoded string parsed on ingest
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// JSON object, or a JSON-encoded string parsed on ingest
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
    /// Execution options; unknown fields are ignored
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

pub async fn execute_workflow(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<RunResult>, ApiError> {
    let workflow = match (request.workflow, request.workflow_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "provide either workflow or workflowId, not both".to_string(),
            ));
        }
        (Some(workflow), None) => workflow,
        (None, Some(id)) => {
            let record = state
                .store
                .get_config(EntityKind::Workflow, &id, &tenant)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("workflow '{id}'")))?;
            let mut workflow: Workflow = serde_json::from_value(record.payload)
                .map_err(|e| ApiError::Internal(format!("stored workflow is not valid: {e}")))?;
            workflow.id = record.id;
            workflow
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "provide a workflow or a workflowId".to_string(),
            ));
        }
    };

    let payload = coerce_json(request.payload, "payload")?;
    let credentials = coerce_json(request.credentials, "credentials")?;
    let options = parse_options(request.options)?;

    let run = state
        .executor
        .execute(workflow, payload, credentials, options, &tenant)
        .await?;
    Ok(Json(run))
}

/// Accept a value as-is, or parse it when it arrives as a JSON string
fn coerce_json(
    value: Option<serde_json::Value>,
    what: &str,
) -> Result<serde_json::Value, ApiError> {
    match value {
        None => Ok(serde_json::Value::Object(serde_json::Map::new())),
        Some(serde_json::Value::String(text)) => serde_json::from_str(&text)
            .map_err(|e| ApiError::BadRequest(format!("{what} is not valid JSON: {e}"))),
        Some(other) => Ok(other),
    }
}

fn parse_options(options: Option<serde_json::Value>) -> Result<RunOptions, ApiError> {
    match options {
        None => Ok(RunOptions::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| ApiError::BadRequest(format!("invalid options: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_json_parses_strings() {
        let parsed = coerce_json(Some(json!("{\"term\":\"abc\"}")), "payload").unwrap();
        assert_eq!(parsed, json!({"term": "abc"}));

        let err = coerce_json(Some(json!("not json")), "payload").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        assert_eq!(coerce_json(None, "payload").unwrap(), json!({}));
    }

    #[test]
    fn test_parse_options_ignores_unknown_fields() {
        let options = parse_options(Some(json!({"cacheMode": "READONLY", "mystery": 1}))).unwrap();
        assert_eq!(options.cache_mode, splice_domain::CacheMode::Readonly);

        let err = parse_options(Some(json!({"timeoutSecs": "soon"}))).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
