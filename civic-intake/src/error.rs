//! Error types for civic-intake

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::SubmissionError;

pub const NOT_AUTHENTICATED_MESSAGE: &str = "User not authenticated.";
pub const ENRICHMENT_FAILED_MESSAGE: &str = "AI services failed. Please try again later.";
pub const DUPLICATE_MESSAGE: &str = "This issue may already be reported. Please check existing reports.";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400), optionally naming the offending form field
    #[error("Invalid request: {message}")]
    BadRequest {
        message: String,
        field: Option<String>,
    },

    /// Missing or expired session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated with the wrong role (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Likely duplicate report (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream service failed (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Common error: {0}")]
    Common(#[from] civic_common::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: None,
        }
    }

    /// Upstream or storage failure, as opposed to a rejected request
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            ApiError::BadGateway(_) | ApiError::Internal(_) | ApiError::Common(_)
        )
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::NotAuthenticated => ApiError::Unauthorized(NOT_AUTHENTICATED_MESSAGE.to_string()),
            SubmissionError::Forbidden(role) => {
                ApiError::Forbidden(format!("Role '{}' may not submit issues.", role.as_str()))
            }
            SubmissionError::Validation(e) => ApiError::BadRequest {
                message: e.message,
                field: Some(e.field.to_string()),
            },
            SubmissionError::Upload { message, .. } => {
                ApiError::BadGateway(format!("Failed to upload images: {}", message))
            }
            SubmissionError::Enrichment(_) => ApiError::BadGateway(ENRICHMENT_FAILED_MESSAGE.to_string()),
            SubmissionError::Duplicate { .. } => ApiError::Conflict(DUPLICATE_MESSAGE.to_string()),
            SubmissionError::Storage(msg) => ApiError::Internal(format!("Failed to save issue: {}", msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, field) = match self {
            ApiError::BadRequest { message, field } => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message, field),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "DUPLICATE_ISSUE", msg, None),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(field) = field {
            error["field"] = json!(field);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
