//! Data-binding expression language
//!
//! All data binding between steps — input mappings, response mappings, loop
//! selectors, and the final transform — evaluates the same JSON-query
//! language against a JSON context, so this module's error contract defines
//! the engine's failure boundary for user-authored expressions.
//!
//! The language is a JSON-query subset: `$` returns the whole context, bare
//! names read context fields, paths map over arrays, `.(expr)` projects per
//! item, `[n]`/`[a..b]`/`[predicate]` index, slice, and filter, and a small
//! set of `$functions` covers keys, counting, summing, and coercions.
//! Missing fields evaluate to "no value", never an error.

mod eval;
mod functions;
mod lexer;
mod parser;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::SchemaService;

/// Expression compilation and evaluation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("parse error at offset {pos}: {message}")]
    Parse { pos: usize, message: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("unknown function: ${0}")]
    UnknownFunction(String),
}

/// A compiled expression, reusable across evaluations
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: parser::Expr,
}

impl Expression {
    /// Compile an expression without evaluating it
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let ast = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a context; `Ok(None)` means "no value"
    pub fn evaluate(&self, ctx: &Value) -> Result<Option<Value>, ExprError> {
        eval::eval(&self.ast, ctx)
    }
}

/// One-shot compile + evaluate
pub fn evaluate(source: &str, ctx: &Value) -> Result<Option<Value>, ExprError> {
    Expression::parse(source)?.evaluate(ctx)
}

/// Result of evaluating a mapping, optionally validated against a schema
///
/// The error string distinguishes evaluation failures (`expression error:`)
/// from validation failures (`schema validation failed:`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MappingOutcome {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Evaluate an expression and, when a schema is given, validate the result
pub async fn evaluate_with_schema(
    source: &str,
    ctx: &Value,
    schema: Option<&Value>,
    schemas: &SchemaService,
) -> MappingOutcome {
    let data = match evaluate(source, ctx) {
        Ok(data) => data,
        Err(e) => return MappingOutcome::failed(format!("expression error: {e}")),
    };

    if let Some(schema) = schema {
        let candidate = data.clone().unwrap_or(Value::Null);
        match schemas.validate(schema, &candidate).await {
            Ok(result) if result.is_valid => {}
            Ok(result) => {
                return MappingOutcome {
                    success: false,
                    data,
                    error: Some(format!(
                        "schema validation failed: {}",
                        result.describe_first()
                    )),
                };
            }
            Err(e) => {
                return MappingOutcome {
                    success: false,
                    data,
                    error: Some(format!("schema validation failed: {e}")),
                };
            }
        }
    }

    MappingOutcome::ok(data)
}
