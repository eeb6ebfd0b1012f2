//! Run-sample cache and advisory helpers
//!
//! After a successful run, the accumulated context is cached as a sample so
//! mapping expressions can be validated without re-running the workflow.
//! Samples are keyed by `(tenant, workflow id)` — never by workflow id
//! alone — and each refresh replaces the previous sample whole.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use splice_domain::{ExecutionMode, Workflow};

use crate::expr::{evaluate_with_schema, MappingOutcome};
use crate::schema::{SchemaInferenceResult, SchemaService};

type SampleKey = (String, String);

/// Per-process cache of the latest run context per workflow
#[derive(Default)]
pub struct SampleCache {
    samples: RwLock<HashMap<SampleKey, Value>>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sample for a workflow
    pub async fn store(&self, tenant_key: &str, workflow_id: &str, sample: Value) {
        let mut samples = self.samples.write().await;
        samples.insert((tenant_key.to_string(), workflow_id.to_string()), sample);
    }

    pub async fn get(&self, tenant_key: &str, workflow_id: &str) -> Option<Value> {
        let samples = self.samples.read().await;
        samples
            .get(&(tenant_key.to_string(), workflow_id.to_string()))
            .cloned()
    }

    /// Evaluate a candidate expression against the cached sample.
    ///
    /// Returns `None` when the workflow has no sample yet (it has to run
    /// once first).
    pub async fn validate_expression(
        &self,
        tenant_key: &str,
        workflow_id: &str,
        expression: &str,
        schema: Option<&Value>,
        schemas: &SchemaService,
    ) -> Option<MappingOutcome> {
        let sample = self.get(tenant_key, workflow_id).await?;
        Some(evaluate_with_schema(expression, &sample, schema, schemas).await)
    }

    /// Infer a response schema from the cached sample's final shape
    pub async fn infer_schema(
        &self,
        tenant_key: &str,
        workflow_id: &str,
        final_transform: &str,
        schemas: &SchemaService,
    ) -> Option<SchemaInferenceResult> {
        let sample = self.get(tenant_key, workflow_id).await?;
        let shaped = crate::expr::evaluate(final_transform, &sample)
            .ok()
            .flatten()
            .unwrap_or(Value::Null);
        Some(schemas.infer_schema(std::slice::from_ref(&shaped)))
    }
}

/// Deterministic English summary of what a workflow does
pub fn describe_workflow(workflow: &Workflow) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Workflow '{}' executes {} step{}.\n",
        workflow.id,
        workflow.steps.len(),
        if workflow.steps.len() == 1 { "" } else { "s" }
    ));

    for (index, step) in workflow.steps.iter().enumerate() {
        let config = &step.api_config;
        out.push_str(&format!(
            "{}. '{}': {} {}",
            index + 1,
            step.id,
            config.method.as_str(),
            config.url()
        ));
        if step.execution_mode == ExecutionMode::Loop {
            let selector = step.loop_selector.as_deref().unwrap_or("?");
            out.push_str(&format!(" once per item of `{selector}`"));
            if let Some(cap) = step.loop_max_iters {
                out.push_str(&format!(" (at most {cap} iterations)"));
            }
        }
        if let Some(instruction) = &config.instruction {
            out.push_str(&format!(" — {instruction}"));
        }
        out.push('\n');
    }

    match &workflow.final_transform {
        Some(transform) if transform != "$" => {
            out.push_str(&format!("The final output is `{transform}`.\n"));
        }
        _ => out.push_str("The final output is the accumulated context.\n"),
    }
    out
}
