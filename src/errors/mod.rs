//! Unified error handling with consistent API response envelope.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error detail in the API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Consistent JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result in the envelope.
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            data: Some(data),
            error: None,
        })
    }

    /// Wrap an error in the envelope.
    pub fn error(code: &str, message: &str) -> Json<Self> {
        Json(Self {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        })
    }
}

/// Application error type mapping to HTTP status codes.
///
/// Every variant is returned to the caller as-is; only storage-level
/// transient failures are retried, and only inside the counter stores.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate pattern: {0}")]
    DuplicatePattern(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Pattern not configured: {0}")]
    PatternNotConfigured(String),

    #[error("Sequence overflow: {0}")]
    SequenceOverflow(String),

    #[error("Transient contention: {0}")]
    TransientContention(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientContention(_))
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DuplicatePattern(_) => "DUPLICATE_PATTERN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PatternNotConfigured(_) => "PATTERN_NOT_CONFIGURED",
            AppError::SequenceOverflow(_) => "SEQUENCE_OVERFLOW",
            AppError::TransientContention(_) => "TRANSIENT_CONTENTION",
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicatePattern(_)
            | AppError::Conflict(_)
            | AppError::PatternNotConfigured(_) => StatusCode::CONFLICT,
            AppError::SequenceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TransientContention(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "An internal error occurred".to_string()
            }
            AppError::Redis(e) => {
                tracing::error!(error = %e, "Redis error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            AppError::TransientContention(msg) => {
                tracing::warn!(error = %msg, "Counter contention exhausted retry budget");
                msg.clone()
            }
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::DuplicatePattern(msg)
            | AppError::Conflict(msg)
            | AppError::PatternNotConfigured(msg)
            | AppError::SequenceOverflow(msg) => msg.clone(),
        };

        let body = ApiResponse::<()> {
            data: None,
            error: Some(ApiError {
                code: self.code().to_string(),
                message,
            }),
        };

        (self.status(), Json(body)).into_response()
    }
}
