//! Error types for the REST API.
//!
//! Every failure leaves the server as `{ "code": "...", "message": "..." }`.
//!
//! ```text
//! CoreError::Validation / TotalMismatch   → 400 VALIDATION_ERROR
//! CoreError::ProductNotFound / …NotFound  → 404 NOT_FOUND
//! CoreError::InsufficientStock            → 400 INSUFFICIENT_STOCK
//! CoreError::ScanAlreadySynced            → 409 CONFLICT
//! DbError::UniqueViolation                → 409 CONFLICT
//! DbError (other)                         → 500 DATABASE_ERROR (details logged only)
//! missing / bad bearer token              → 401 UNAUTHORIZED
//! ```

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use rx_core::{CoreError, ErrorKind};
use rx_db::DbError;

/// Wire body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// API error: an HTTP status plus the public body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn insufficient_stock(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn database() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Internal server error")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error")
    }

    /// Same code and message with a different status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::Validation => ApiError::validation(message),
            ErrorKind::NotFound => ApiError::not_found(message),
            ErrorKind::InsufficientStock => ApiError::insufficient_stock(message),
            ErrorKind::Conflict => ApiError::conflict(message),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { .. } => ApiError::not_found(error.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict(error.to_string()),
            other => {
                tracing::error!(error = %other, "Database error");
                ApiError::database()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_codes() {
        let err: ApiError = CoreError::product_not_found("p99").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");

        let err: ApiError = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            product_name: "Paracetamol".to_string(),
            available: 2,
            requested: 3,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INSUFFICIENT_STOCK");
        assert!(err.message.contains("Paracetamol"));

        let err: ApiError = CoreError::ScanAlreadySynced("s1".to_string()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = CoreError::TotalMismatch {
            declared: 1,
            computed: 2,
        }
        .into();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_internal_db_errors_are_hidden() {
        let err: ApiError = DbError::QueryFailed("syntax error near SELECT".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "DATABASE_ERROR");
        assert!(!err.message.contains("SELECT"));

        let err: ApiError = DbError::Domain(CoreError::ScanNotFound("s1".to_string())).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
