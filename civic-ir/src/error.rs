//! Error types for civic-ir
//!
//! Validation and authorization failures are terminal and reported as 4xx.
//! Storage failures surface as 500 without retry.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use civic_common::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400)
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// No or invalid identity (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but insufficient role (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Classifier failed or timed out (502)
    ///
    /// Report creation recovers from this locally; it only reaches a client
    /// if some future caller chooses to propagate it.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Persistence layer error (500)
    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// civic-common error
    #[error("Common error: {0}")]
    Common(#[from] civic_common::Error),

    /// IO error (500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error naming the offending field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Common(civic_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(civic_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_)
            | ApiError::Common(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::Validation { field, message } => {
                ErrorResponse::with_field("VALIDATION_ERROR", message.clone(), field.clone())
            }
            ApiError::Unauthenticated(msg) => ErrorResponse::new("UNAUTHENTICATED", msg.clone()),
            ApiError::Forbidden(msg) => ErrorResponse::new("FORBIDDEN", msg.clone()),
            ApiError::NotFound(msg) => ErrorResponse::new("NOT_FOUND", msg.clone()),
            ApiError::UpstreamUnavailable(msg) => {
                ErrorResponse::new("UPSTREAM_UNAVAILABLE", msg.clone())
            }
            ApiError::Storage(err) => {
                error!("Storage failure: {}", err);
                ErrorResponse::new("STORAGE_FAILURE", "Storage operation failed")
            }
            ApiError::Common(civic_common::Error::Database(err)) => {
                error!("Storage failure: {}", err);
                ErrorResponse::new("STORAGE_FAILURE", "Storage operation failed")
            }
            ApiError::Common(err) => {
                if status.is_server_error() {
                    error!("Common error: {}", err);
                }
                ErrorResponse::new("COMMON_ERROR", err.to_string())
            }
            ApiError::Io(err) => {
                error!("IO error: {}", err);
                ErrorResponse::new("IO_ERROR", "File operation failed")
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ErrorResponse::new("INTERNAL_ERROR", msg.clone())
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("query", rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
