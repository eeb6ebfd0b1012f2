//! Engine error taxonomy
//!
//! Every error surfaced to a caller carries a short human diagnostic plus a
//! stable kind tag (see [`EngineError::kind`]). Propagation rules: binding,
//! expression, network, HTTP, and decode errors fail the step and abort the
//! workflow; schema-validation failure marks the run failed while keeping
//! its data; an archival store failure is logged, never surfaced.

use std::time::Duration;

use thiserror::Error;

use crate::expr::ExprError;

/// Errors raised while executing workflows
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input: missing required field, bad enum, duplicate step id
    #[error("validation error: {0}")]
    Validation(String),

    /// A `{placeholder}` or mapping referenced a field absent at runtime
    #[error("binding error: {0}")]
    Binding(String),

    /// Expression compilation or evaluation failure
    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    /// Transport failure after retries
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx status after retries
    #[error("http error: status {status}: {snippet}")]
    Http { status: u16, snippet: String },

    /// Response body not parseable in its declared content type
    #[error("decode error: {0}")]
    Decode(String),

    /// Persistence backend failure
    #[error("store error: {0}")]
    Store(#[from] splice_db::StoreError),

    /// Final data violates the workflow's response schema
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Workflow or call deadline exceeded
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Credential invalid or absent
    #[error("auth error: {0}")]
    Auth(String),
}

impl EngineError {
    /// Stable kind tag for wire surfaces and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Binding(_) => "BindingError",
            Self::Expression(_) => "ExpressionError",
            Self::Network(_) => "NetworkError",
            Self::Http { .. } => "HttpError",
            Self::Decode(_) => "DecodeError",
            Self::Store(_) => "StoreError",
            Self::SchemaValidation(_) => "SchemaValidationError",
            Self::Timeout(_) => "TimeoutError",
            Self::Auth(_) => "AuthError",
        }
    }

    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(EngineError::Validation("x".into()).kind(), "ValidationError");
        assert_eq!(
            EngineError::Http {
                status: 502,
                snippet: String::new()
            }
            .kind(),
            "HttpError"
        );
        assert_eq!(
            EngineError::Timeout(Duration::from_secs(1)).kind(),
            "TimeoutError"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::Network("refused".into()).is_transient());
        assert!(EngineError::Http {
            status: 503,
            snippet: String::new()
        }
        .is_transient());
        assert!(!EngineError::Http {
            status: 404,
            snippet: String::new()
        }
        .is_transient());
        assert!(!EngineError::Binding("missing".into()).is_transient());
    }
}
