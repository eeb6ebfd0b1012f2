//! Run results and execution options
//!
//! A [`RunResult`] is the immutable record of one workflow execution:
//! per-step outcomes in execution order, the final transformed artifact,
//! and a snapshot of the workflow that ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

use crate::workflow::Workflow;

/// Response-cache behavior for a run
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    Enabled,
    Readonly,
    Writeonly,
    /// Default for interactive runs: bypass the cache entirely
    #[default]
    Disabled,
}

/// Caller-supplied options for one execution
///
/// Unknown fields are ignored on ingest; bad values fail deserialization
/// before the executor is invoked.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// Whole-run deadline in seconds; no deadline when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Archive the run result through the data store
    #[serde(default = "default_true")]
    pub persist_results: bool,
    /// Bounded fan-out for LOOP iterations
    #[serde(default = "default_loop_concurrency")]
    pub loop_concurrency: u32,
}

fn default_true() -> bool {
    true
}

fn default_loop_concurrency() -> u32 {
    4
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Disabled,
            timeout_secs: None,
            persist_results: true,
            loop_concurrency: default_loop_concurrency(),
        }
    }
}

/// Loop-cap accounting for a LOOP step
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStats {
    /// Items the loop selector produced
    pub selected: u32,
    /// Iterations actually driven
    pub executed: u32,
    /// Whether `loopMaxIters` dropped any items
    pub truncated: bool,
}

/// Outcome of one step within a run
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunResult {
    pub step_id: String,
    pub success: bool,
    /// Decoded response payload (array of payloads for LOOP steps)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    /// Output after the response mapping, as stored into the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_stats: Option<LoopStats>,
}

impl StepRunResult {
    pub fn succeeded(
        step_id: impl Into<String>,
        raw: serde_json::Value,
        transformed: serde_json::Value,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            raw_data: Some(raw),
            transformed_data: Some(transformed),
            error: None,
            loop_stats: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            raw_data: None,
            transformed_data: None,
            error: Some(error.into()),
            loop_stats: None,
        }
    }

    pub fn with_loop_stats(mut self, stats: LoopStats) -> Self {
        self.loop_stats = Some(stats);
        self
    }
}

/// Immutable record of one workflow execution
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub id: Uuid,
    pub success: bool,
    /// Snapshot of the workflow that ran
    pub config: Workflow,
    /// One entry per step actually driven, in execution order
    pub step_results: Vec<StepRunResult>,
    /// Final transformed artifact; populated even on schema-validation
    /// failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
