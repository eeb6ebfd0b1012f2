//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use splice_db::StoreError;
use splice_engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "AuthError"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => Self::NotFound(format!("{kind} '{id}'")),
            StoreError::AlreadyExists { kind, id } => {
                Self::Conflict(format!("{kind} '{id}' already exists"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match &e {
            EngineError::Validation(message) => Self::BadRequest(message.clone()),
            EngineError::Auth(_) => Self::Unauthorized,
            EngineError::Store(store) => {
                Self::Internal(format!("{}: {store}", e.kind()))
            }
            _ => Self::Internal(format!("{}: {e}", e.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_404() {
        let api: ApiError = StoreError::NotFound {
            kind: "workflow",
            id: "w1".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::NotFound(_)));
    }

    #[test]
    fn test_engine_validation_maps_to_400() {
        let api: ApiError = EngineError::Validation("no steps".to_string()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));
    }
}
