//! API error types and handling.
//!
//! A unified error type that maps to HTTP status codes and JSON error
//! responses. The same `code`/`message` vocabulary is reused for WebSocket
//! error frames so clients parse one shape everywhere.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use fallwatch_core::CoreError;

/// API error type that converts to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request data (400)
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Required multipart field absent (400)
    #[error("Missing multipart field: {field}")]
    MissingField { field: &'static str },

    /// Upload is not a decodable image (400)
    #[error("Invalid image: {message}")]
    InvalidImage { message: String },

    /// Pose oracle failed on a decodable frame (500)
    #[error("Pose oracle failed: {message}")]
    Oracle { message: String },

    /// Internal server error (500)
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Malformed multipart stream (400)
    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl ApiError {
    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::MissingField { .. } | Self::InvalidImage { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Oracle { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidImage { .. } => "INVALID_IMAGE",
            Self::Oracle { .. } => "ORACLE_FAILURE",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::Multipart(_) => "MULTIPART_ERROR",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::BadRequest { message },
            CoreError::Image(e) => Self::InvalidImage {
                message: e.to_string(),
            },
            CoreError::Oracle { message } => Self::Oracle { message },
            CoreError::Configuration { message } => Self::Internal { message },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Field that caused the error, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for log correlation
    pub request_id: Uuid,
}

impl ErrorResponse {
    /// Build the response body for an error, minting a fresh request id.
    pub fn from_error(error: &ApiError) -> Self {
        let field = match error {
            ApiError::MissingField { field } => Some((*field).to_string()),
            _ => None,
        };
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            field,
            request_id: Uuid::new_v4(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from_error(&self);

        match &self {
            ApiError::Oracle { .. } | ApiError::Internal { .. } => {
                tracing::error!(error = %self, request_id = %body.request_id, "API error");
            }
            _ => {
                tracing::warn!(error = %self, request_id = %body.request_id, "API error");
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
