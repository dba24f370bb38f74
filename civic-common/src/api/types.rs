//! Shared API request/response types

use serde::Serialize;

// ========================================
// Error Response Types
// ========================================

/// Error body returned by every failing endpoint
///
/// Rendered as `{"error": {"code": ..., "message": ..., "field": ...}}`.
///
/// # Examples
///
/// ```
/// use civic_common::api::types::ErrorResponse;
///
/// let body = ErrorResponse::with_field("VALIDATION_ERROR", "description is required", "description");
/// let json = serde_json::to_value(&body).unwrap();
/// assert_eq!(json["error"]["field"], "description");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Inner error payload
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Error type identifier
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Offending request field (validation errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    /// Create new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                field: None,
            },
        }
    }

    /// Create error response naming the offending field
    pub fn with_field(
        code: impl Into<String>,
        message: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                field: Some(field.into()),
            },
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

// ========================================
// Tests
// ========================================
