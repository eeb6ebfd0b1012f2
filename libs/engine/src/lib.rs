//! Splice Engine - workflow execution
//!
//! The interpreter at the heart of Splice: it schedules HTTP calls,
//! evaluates data-binding expressions over intermediate state, iterates
//! steps over dynamic collections, and composes a final artifact via a
//! user-supplied expression.
//!
//! - [`expr`] — the data-binding expression language
//! - [`http`] — request materialization, retries, pagination
//! - [`step`] — DIRECT and LOOP step execution
//! - [`executor`] — workflow sequencing, final transform, run results
//! - [`schema`], [`sample`], [`cache`], [`logs`] — validation, sampling,
//!   response caching, and the realtime log hub

pub mod cache;
pub mod error;
pub mod executor;
pub mod expr;
pub mod http;
pub mod logs;
pub mod sample;
pub mod schema;
pub mod step;
mod template;

pub use cache::ResponseCache;
pub use error::EngineError;
pub use executor::WorkflowExecutor;
pub use expr::{evaluate, evaluate_with_schema, ExprError, Expression, MappingOutcome};
pub use http::{CallOutcome, HttpCaller};
pub use logs::LogHub;
pub use sample::{describe_workflow, SampleCache};
pub use schema::{SchemaService, ValidationIssue, ValidationResult};
