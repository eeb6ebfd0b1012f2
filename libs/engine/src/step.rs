//! Single-step execution
//!
//! A DIRECT step is one mapped API call. A LOOP step evaluates its selector
//! against the accumulated context and drives the same pipeline once per
//! item, with bounded fan-out; the output sequence is always in item order
//! regardless of completion order.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use uuid::Uuid;

use splice_domain::{ExecutionMode, LogLevel, LoopStats, RunOptions, Step, StepRunResult};

use crate::error::EngineError;
use crate::expr::evaluate;
use crate::http::HttpCaller;
use crate::logs::LogHub;

/// Per-run parameters shared by every step
pub struct StepContext<'a> {
    pub credentials: &'a Value,
    pub options: &'a RunOptions,
    pub tenant_key: &'a str,
    pub run_id: Uuid,
}

/// Executes one step against an accumulated context
pub struct StepRunner<'a> {
    caller: &'a HttpCaller,
    logs: &'a LogHub,
}

impl<'a> StepRunner<'a> {
    pub fn new(caller: &'a HttpCaller, logs: &'a LogHub) -> Self {
        Self { caller, logs }
    }

    pub async fn run(
        &self,
        step: &Step,
        ctx: &Value,
        sc: &StepContext<'_>,
    ) -> Result<StepRunResult, EngineError> {
        match step.execution_mode {
            ExecutionMode::Direct => self.run_direct(step, ctx, sc).await,
            ExecutionMode::Loop => self.run_loop(step, ctx, sc).await,
        }
    }

    async fn run_direct(
        &self,
        step: &Step,
        ctx: &Value,
        sc: &StepContext<'_>,
    ) -> Result<StepRunResult, EngineError> {
        let (raw, transformed) = self.invoke(step, ctx, None, sc).await?;
        Ok(StepRunResult::succeeded(&step.id, raw, transformed))
    }

    async fn run_loop(
        &self,
        step: &Step,
        ctx: &Value,
        sc: &StepContext<'_>,
    ) -> Result<StepRunResult, EngineError> {
        let selector = step.loop_selector.as_deref().ok_or_else(|| {
            EngineError::Validation(format!("LOOP step '{}' has no loopSelector", step.id))
        })?;

        let items = match evaluate(selector, ctx)? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(single) => vec![single],
        };

        let selected = items.len();
        let executed = match step.loop_max_iters {
            Some(cap) => selected.min(cap as usize),
            None => selected,
        };
        let stats = LoopStats {
            selected: selected as u32,
            executed: executed as u32,
            truncated: executed < selected,
        };
        if stats.truncated {
            self.logs.emit(
                LogLevel::Info,
                format!(
                    "step '{}': loop capped at {executed} of {selected} items",
                    step.id
                ),
                Some(sc.run_id),
            );
        }

        let concurrency = (sc.options.loop_concurrency.max(1)) as usize;
        let invocations = items.into_iter().take(executed).enumerate().map(|(k, item)| {
            let iter_ctx = with_loop_vars(ctx, &item, k);
            async move { self.invoke(step, &iter_ctx, Some((&item, k)), sc).await }
        });

        let results: Vec<(Value, Value)> = stream::iter(invocations)
            .buffered(concurrency)
            .try_collect()
            .await?;

        let (raw, transformed): (Vec<Value>, Vec<Value>) = results.into_iter().unzip();
        Ok(
            StepRunResult::succeeded(&step.id, Value::Array(raw), Value::Array(transformed))
                .with_loop_stats(stats),
        )
    }

    /// The shared pipeline: input mapping, HTTP call, response mapping
    async fn invoke(
        &self,
        step: &Step,
        ctx: &Value,
        loop_item: Option<(&Value, usize)>,
        sc: &StepContext<'_>,
    ) -> Result<(Value, Value), EngineError> {
        let input = evaluate(step.input_mapping(), ctx)?.unwrap_or(Value::Null);

        let outcome = self
            .caller
            .call(
                &step.api_config,
                &input,
                sc.credentials,
                sc.options.cache_mode,
                sc.tenant_key,
            )
            .await?;

        // Inside a loop, the response mapping can also see the loop
        // variables; response fields win on collision.
        let response_ctx = match loop_item {
            Some((item, index)) => with_loop_vars_under(&outcome.data, item, index),
            None => outcome.data.clone(),
        };
        let transformed = evaluate(step.response_mapping(), &response_ctx)?.unwrap_or(Value::Null);

        Ok((outcome.data, transformed))
    }
}

/// Context for one loop iteration: the accumulated context plus
/// `loopValue`/`loopIndex`
fn with_loop_vars(ctx: &Value, item: &Value, index: usize) -> Value {
    let mut map = match ctx {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other.clone());
            map
        }
    };
    map.insert("loopValue".to_string(), item.clone());
    map.insert("loopIndex".to_string(), Value::Number((index as u64).into()));
    Value::Object(map)
}

/// Response-mapping context for one loop iteration: the decoded payload with
/// the loop variables merged in (payload keys win). Non-object payloads are
/// left untouched.
fn with_loop_vars_under(payload: &Value, item: &Value, index: usize) -> Value {
    match payload {
        Value::Object(map) => {
            let mut merged = map.clone();
            merged
                .entry("loopValue".to_string())
                .or_insert_with(|| item.clone());
            merged
                .entry("loopIndex".to_string())
                .or_insert_with(|| Value::Number((index as u64).into()));
            Value::Object(merged)
        }
        other => other.clone(),
    }
}
