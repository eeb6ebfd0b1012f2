//! Workflow and step definitions
//!
//! A workflow is a named, ordered list of API-call steps plus a final
//! transform expression. Steps thread data forward: each step's transformed
//! output lands in the shared context under the step's id, where later
//! steps' mappings and the final transform can reference it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::api_config::ApiConfig;

/// How a step drives its API call
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// One call per step
    #[default]
    Direct,
    /// One call per item of the loop selector's sequence
    Loop,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Loop => "LOOP",
        }
    }
}

/// One unit of work inside a workflow
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique within the workflow; doubles as the context field the step's
    /// output is stored under
    pub id: String,
    pub api_config: ApiConfig,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Expression producing the sequence a LOOP step iterates over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_selector: Option<String>,
    /// Iteration cap; excess items are dropped and recorded in loop stats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_max_iters: Option<u32>,
    /// Expression computing the per-invocation input (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<String>,
    /// Expression computing the stored output (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<String>,
}

impl Step {
    pub fn input_mapping(&self) -> &str {
        self.input_mapping.as_deref().unwrap_or("$")
    }

    pub fn response_mapping(&self) -> &str {
        self.response_mapping.as_deref().unwrap_or("$")
    }
}

/// Named, versioned unit of execution
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub steps: Vec<Step>,
    /// Expression composing the final artifact from the accumulated context
    /// (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_transform: Option<String>,
    /// Optional JSON Schema the final artifact must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    /// Human-readable description of what the workflow does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn final_transform(&self) -> &str {
        self.final_transform.as_deref().unwrap_or("$")
    }

    /// Ids of all steps, in execution order
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// First step id duplicated within the workflow, if any
    pub fn duplicate_step_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.steps.iter().map(|s| s.id.as_str()).find(|id| !seen.insert(*id))
    }
}
