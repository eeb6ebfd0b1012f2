//! Workflow execution
//!
//! Drives an ordered list of steps strictly sequentially, accumulating each
//! step's transformed output into the shared context under the step's id,
//! then applies the final transform and validates it against the workflow's
//! response schema. Emits one immutable [`RunResult`] per execution and
//! archives it through the data store (archival failures are logged, never
//! surfaced).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use splice_db::{DataStore, EntityKind, RunRecord, TenantScope};
use splice_domain::{
    ApiConfig, ExecutionMode, LogLevel, RunOptions, RunResult, StepRunResult, Workflow,
};

use crate::cache::ResponseCache;
use crate::error::EngineError;
use crate::expr::evaluate;
use crate::http::HttpCaller;
use crate::logs::LogHub;
use crate::sample::SampleCache;
use crate::schema::SchemaService;
use crate::step::{StepContext, StepRunner};

/// Orchestrates workflow executions end to end
pub struct WorkflowExecutor {
    store: Arc<dyn DataStore>,
    caller: HttpCaller,
    schemas: Arc<SchemaService>,
    logs: Arc<LogHub>,
    samples: Arc<SampleCache>,
}

impl WorkflowExecutor {
    pub fn new(
        store: Arc<dyn DataStore>,
        cache: Arc<ResponseCache>,
        schemas: Arc<SchemaService>,
        logs: Arc<LogHub>,
        samples: Arc<SampleCache>,
    ) -> Self {
        Self {
            store,
            caller: HttpCaller::new(cache),
            schemas,
            logs,
            samples,
        }
    }

    /// Execute a workflow against a payload.
    ///
    /// Input-shape problems (no steps, duplicate step ids, unresolvable API
    /// config references) surface as errors before anything runs; every
    /// runtime outcome — including failures — is reported as a [`RunResult`].
    pub async fn execute(
        &self,
        workflow: Workflow,
        payload: Value,
        credentials: Value,
        options: RunOptions,
        tenant: &TenantScope,
    ) -> Result<RunResult, EngineError> {
        validate(&workflow)?;
        let workflow = self.resolve_api_references(workflow, tenant).await?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = options
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        self.logs.emit(
            LogLevel::Info,
            format!("run started for workflow '{}'", workflow.id),
            Some(run_id),
        );

        let mut ctx = initial_context(payload);
        let credentials = match credentials {
            Value::Object(_) => credentials,
            _ => Value::Object(Map::new()),
        };

        let runner = StepRunner::new(&self.caller, &self.logs);
        let sc = StepContext {
            credentials: &credentials,
            options: &options,
            tenant_key: tenant.storage_key(),
            run_id,
        };

        let mut step_results: Vec<StepRunResult> = Vec::with_capacity(workflow.steps.len());
        let mut run_error: Option<String> = None;

        for step in &workflow.steps {
            let result = match remaining(deadline) {
                Some(budget) if budget.is_zero() => Err(timeout_error(&options)),
                Some(budget) => match tokio::time::timeout(budget, runner.run(step, &ctx, &sc)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error(&options)),
                },
                None => runner.run(step, &ctx, &sc).await,
            };

            match result {
                Ok(step_result) => {
                    self.logs.emit(
                        LogLevel::Info,
                        format!("step '{}' completed", step.id),
                        Some(run_id),
                    );
                    if let (Value::Object(map), Some(transformed)) =
                        (&mut ctx, &step_result.transformed_data)
                    {
                        map.insert(step.id.clone(), transformed.clone());
                    }
                    step_results.push(step_result);
                }
                Err(e) => {
                    let message = format!("{}: {e}", e.kind());
                    self.logs.emit(
                        LogLevel::Error,
                        format!("step '{}' failed: {message}", step.id),
                        Some(run_id),
                    );
                    step_results.push(StepRunResult::failed(&step.id, message.clone()));
                    run_error = Some(message);
                    break;
                }
            }
        }

        let mut data = None;
        if run_error.is_none() {
            match evaluate(workflow.final_transform(), &ctx) {
                Ok(result) => {
                    data = Some(result.unwrap_or(Value::Null));
                }
                Err(e) => {
                    run_error = Some(format!("ExpressionError: final transform: {e}"));
                }
            }
        }

        if run_error.is_none() {
            if let (Some(schema), Some(candidate)) = (&workflow.response_schema, &data) {
                match self.schemas.validate(schema, candidate).await {
                    Ok(result) if result.is_valid => {}
                    Ok(result) => {
                        run_error = Some(format!(
                            "SchemaValidationError: {}",
                            result.describe_first()
                        ));
                    }
                    Err(e) => {
                        run_error = Some(format!("SchemaValidationError: {e}"));
                    }
                }
            }
        }

        let success = run_error.is_none();
        if success {
            self.samples
                .store(tenant.storage_key(), &workflow.id, ctx.clone())
                .await;
        }

        let run = RunResult {
            id: run_id,
            success,
            config: workflow,
            step_results,
            data,
            error: run_error,
            started_at,
            completed_at: Utc::now(),
        };

        self.logs.emit(
            if run.success {
                LogLevel::Info
            } else {
                LogLevel::Error
            },
            format!(
                "run finished: success={} steps={}",
                run.success,
                run.step_results.len()
            ),
            Some(run_id),
        );

        if options.persist_results {
            self.archive(&run, tenant).await;
        }

        Ok(run)
    }

    /// Steps may reference an ApiConfig by id only; fetch and embed a
    /// snapshot so the executed workflow is self-contained.
    async fn resolve_api_references(
        &self,
        mut workflow: Workflow,
        tenant: &TenantScope,
    ) -> Result<Workflow, EngineError> {
        for step in &mut workflow.steps {
            if !step.api_config.url_host.is_empty() {
                continue;
            }
            let id = step.api_config.id.clone();
            let record = self
                .store
                .get_config(EntityKind::Api, &id, tenant)
                .await?
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "step '{}' references unknown api config '{id}'",
                        step.id
                    ))
                })?;
            let config: ApiConfig = serde_json::from_value(record.payload).map_err(|e| {
                EngineError::Validation(format!("api config '{id}' is not valid: {e}"))
            })?;
            step.api_config = config;
        }
        Ok(workflow)
    }

    /// Best-effort archival; a store failure must not change the run outcome
    async fn archive(&self, run: &RunResult, tenant: &TenantScope) {
        let payload = match serde_json::to_value(run) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(run_id = %run.id, error = %e, "run result not serializable");
                return;
            }
        };
        let record = RunRecord {
            id: run.id,
            tenant: tenant.storage_key().to_string(),
            config_id: Some(run.config.id.clone()),
            success: run.success,
            payload,
            started_at: run.started_at,
            completed_at: run.completed_at,
        };
        if let Err(e) = self.store.insert_run(record).await {
            tracing::warn!(run_id = %run.id, error = %e, "failed to archive run result");
            self.logs.emit(
                LogLevel::Warn,
                format!("failed to archive run result: {e}"),
                Some(run.id),
            );
        }
    }
}

fn validate(workflow: &Workflow) -> Result<(), EngineError> {
    if workflow.steps.is_empty() {
        return Err(EngineError::Validation(
            "workflow has no steps".to_string(),
        ));
    }
    if let Some(duplicate) = workflow.duplicate_step_id() {
        return Err(EngineError::Validation(format!(
            "duplicate step id '{duplicate}'"
        )));
    }
    for step in &workflow.steps {
        if step.id.is_empty() {
            return Err(EngineError::Validation("step with empty id".to_string()));
        }
        if step.execution_mode == ExecutionMode::Loop && step.loop_selector.is_none() {
            return Err(EngineError::Validation(format!(
                "LOOP step '{}' has no loopSelector",
                step.id
            )));
        }
    }
    Ok(())
}

/// The context starts as the payload; non-object payloads are wrapped so
/// step outputs always have an object to land in.
fn initial_context(payload: Value) -> Value {
    match payload {
        Value::Object(_) => payload,
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other);
            Value::Object(map)
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
}

fn timeout_error(options: &RunOptions) -> EngineError {
    EngineError::Timeout(Duration::from_secs(options.timeout_secs.unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use splice_db::{MemoryStore, Pagination, RunStore};

    fn executor(store: Arc<dyn DataStore>) -> WorkflowExecutor {
        WorkflowExecutor::new(
            store,
            Arc::new(ResponseCache::new()),
            Arc::new(SchemaService::new()),
            Arc::new(LogHub::new()),
            Arc::new(SampleCache::new()),
        )
    }

    fn workflow(value: Value) -> Workflow {
        serde_json::from_value(value).unwrap()
    }

    async fn run(
        executor: &WorkflowExecutor,
        workflow: Workflow,
        payload: Value,
        options: RunOptions,
    ) -> Result<RunResult, EngineError> {
        executor
            .execute(
                workflow,
                payload,
                json!({}),
                options,
                &TenantScope::of("t1"),
            )
            .await
    }

    #[tokio::test]
    async fn test_empty_steps_is_validation_error() {
        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({"id": "w", "steps": []}));
        let err = run(&executor, workflow, json!({}), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_step_ids_rejected() {
        let executor = executor(Arc::new(MemoryStore::new()));
        let step = json!({
            "id": "s",
            "apiConfig": {"id": "s", "urlHost": "https://unused.invalid", "method": "GET"}
        });
        let workflow = workflow(json!({"id": "w", "steps": [step, step]}));
        let err = run(&executor, workflow, json!({}), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_two_step_loop_workflow_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/breeds/list/all")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                "{\"message\": {\"akita\": [], \"boxer\": [], \"corgi\": []}, \"status\": \"success\"}",
            )
            .create_async()
            .await;
        for breed in ["akita", "boxer"] {
            server
                .mock("GET", format!("/api/breed/{breed}/images/random").as_str())
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(format!(
                    "{{\"message\": \"https://images.test/{breed}.jpg\", \"status\": \"success\"}}"
                ))
                .create_async()
                .await;
        }

        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({
            "id": "dog-breeds",
            "steps": [
                {
                    "id": "getAllBreeds",
                    "apiConfig": {
                        "id": "getAllBreeds",
                        "urlHost": server.url(),
                        "urlPath": "/api/breeds/list/all",
                        "method": "GET"
                    },
                    "responseMapping": "$keys($.message)"
                },
                {
                    "id": "getBreedImage",
                    "apiConfig": {
                        "id": "getBreedImage",
                        "urlHost": server.url(),
                        "urlPath": "/api/breed/{value}/images/random",
                        "method": "GET"
                    },
                    "executionMode": "LOOP",
                    "loopSelector": "getAllBreeds",
                    "loopMaxIters": 2
                }
            ],
            "finalTransform": "$.getBreedImage.({\"breed\": loopValue, \"image\": message})"
        }));

        let run = run(&executor, workflow, json!({}), RunOptions::default())
            .await
            .unwrap();

        assert!(run.success, "run failed: {:?}", run.error);
        assert_eq!(run.step_results.len(), 2);
        assert_eq!(run.step_results[0].step_id, "getAllBreeds");
        assert_eq!(run.step_results[1].step_id, "getBreedImage");
        assert!(run.completed_at >= run.started_at);

        let data = run.data.unwrap();
        let items = data.as_array().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            assert!(item["breed"].is_string());
            assert!(item["image"].is_string());
        }
        assert_eq!(items[0]["breed"], json!("akita"));
        assert_eq!(items[1]["breed"], json!("boxer"));
    }

    #[tokio::test]
    async fn test_step_failure_aborts_following_steps() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/boom")
            .with_status(500)
            .with_body("kaput")
            .create_async()
            .await;
        let untouched = server
            .mock("GET", "/next")
            .expect(0)
            .create_async()
            .await;

        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({
            "id": "w",
            "steps": [
                {
                    "id": "first",
                    "apiConfig": {
                        "id": "first",
                        "urlHost": server.url(),
                        "urlPath": "/boom",
                        "method": "GET",
                        "retries": 0
                    }
                },
                {
                    "id": "second",
                    "apiConfig": {
                        "id": "second",
                        "urlHost": server.url(),
                        "urlPath": "/next",
                        "method": "GET"
                    }
                }
            ]
        }));

        let run = run(&executor, workflow, json!({}), RunOptions::default())
            .await
            .unwrap();

        assert!(!run.success);
        assert_eq!(run.step_results.len(), 1);
        assert!(!run.step_results[0].success);
        assert!(run.error.as_deref().unwrap().contains("HttpError"));
        assert!(run.data.is_none());
        untouched.assert_async().await;
    }

    #[tokio::test]
    async fn test_workflow_timeout_cancels_running_step() {
        // A listener that accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({
            "id": "w",
            "steps": [{
                "id": "slow",
                "apiConfig": {
                    "id": "slow",
                    "urlHost": format!("http://{address}"),
                    "method": "GET",
                    "timeoutSecs": 30
                }
            }]
        }));
        let options = RunOptions {
            timeout_secs: Some(1),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let run = run(&executor, workflow, json!({}), options).await.unwrap();
        let elapsed = started.elapsed();

        assert!(!run.success);
        assert!(run.error.as_deref().unwrap().to_lowercase().contains("timeout"));
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));
        let wall = (run.completed_at - run.started_at).num_milliseconds();
        assert!((1000..5000).contains(&wall));
    }

    #[tokio::test]
    async fn test_schema_violation_fails_run_but_keeps_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/count")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"count\": \"five\"}")
            .create_async()
            .await;

        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({
            "id": "w",
            "steps": [{
                "id": "fetchCount",
                "apiConfig": {
                    "id": "fetchCount",
                    "urlHost": server.url(),
                    "urlPath": "/count",
                    "method": "GET"
                }
            }],
            "finalTransform": "$.fetchCount",
            "responseSchema": {
                "type": "object",
                "properties": {"count": {"type": "integer"}},
                "required": ["count"]
            }
        }));

        let run = run(&executor, workflow, json!({}), RunOptions::default())
            .await
            .unwrap();

        assert!(!run.success);
        assert_eq!(run.data, Some(json!({"count": "five"})));
        assert!(run.error.as_deref().unwrap().contains("count"));
    }

    #[tokio::test]
    async fn test_final_transform_defaults_to_full_context() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/value")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"n\": 7}")
            .create_async()
            .await;

        let executor = executor(Arc::new(MemoryStore::new()));
        let workflow = workflow(json!({
            "id": "w",
            "steps": [{
                "id": "fetch",
                "apiConfig": {
                    "id": "fetch",
                    "urlHost": server.url(),
                    "urlPath": "/value",
                    "method": "GET"
                }
            }]
        }));

        let run = run(
            &executor,
            workflow,
            json!({"seed": true}),
            RunOptions::default(),
        )
        .await
        .unwrap();

        assert!(run.success);
        assert_eq!(
            run.data,
            Some(json!({"seed": true, "fetch": {"n": 7}}))
        );
    }

    #[tokio::test]
    async fn test_run_is_archived_unless_disabled() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let executor = executor(store.clone());
        let make = || {
            workflow(json!({
                "id": "w",
                "steps": [{
                    "id": "fetch",
                    "apiConfig": {
                        "id": "fetch",
                        "urlHost": server.url(),
                        "urlPath": "/ok",
                        "method": "GET"
                    }
                }]
            }))
        };

        run(&executor, make(), json!({}), RunOptions::default())
            .await
            .unwrap();
        let archived = store
            .list_runs(&Pagination::default(), None, &TenantScope::of("t1"))
            .await
            .unwrap();
        assert_eq!(archived.total, 1);
        assert_eq!(archived.items[0].config_id.as_deref(), Some("w"));

        let options = RunOptions {
            persist_results: false,
            ..Default::default()
        };
        run(&executor, make(), json!({}), options).await.unwrap();
        let archived = store
            .list_runs(&Pagination::default(), None, &TenantScope::of("t1"))
            .await
            .unwrap();
        assert_eq!(archived.total, 1);
    }
}
