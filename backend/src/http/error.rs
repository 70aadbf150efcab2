//! HTTP error handling and response types.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::ReportError;
use crate::db::repository::RepositoryError;
use crate::db::services::ServiceError;
use crate::models::ValidationError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Request field responsible for the error, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or invalid request input
    BadRequest {
        message: String,
        field: Option<String>,
    },
    /// Missing or malformed caller identity
    Unauthorized(String),
    /// Caller lacks the role or ownership required
    Forbidden(String),
    /// Resource not found
    NotFound(String),
    /// Internal server error
    Internal(String),
    /// Repository error
    Repository(RepositoryError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, field: Option<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
            field,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Repository(e) => match e {
                RepositoryError::NotFound { .. } => StatusCode::NOT_FOUND,
                RepositoryError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest { message, field } => {
                ApiError::new("BAD_REQUEST", message).with_field(field)
            }
            AppError::Unauthorized(msg) => ApiError::new("UNAUTHORIZED", msg),
            AppError::Forbidden(msg) => ApiError::new("FORBIDDEN", msg),
            AppError::NotFound(msg) => ApiError::new("NOT_FOUND", msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error while handling request");
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
            AppError::Repository(e) => match e {
                RepositoryError::NotFound { message, .. } => ApiError::new("NOT_FOUND", message),
                RepositoryError::ValidationError { message, context } => {
                    ApiError::new("BAD_REQUEST", message).with_field(context.field)
                }
                other => {
                    tracing::error!(
                        error = %other,
                        retryable = other.is_retryable(),
                        "Repository failure"
                    );

                    ApiError::new("REPOSITORY_ERROR", "Internal server error")
                }
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::bad_request(err.message, Some(err.field))
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let field = err.field();
        AppError::bad_request(err.to_string(), Some(field))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => e.into(),
            ServiceError::Report(e) => e.into(),
            ServiceError::Forbidden(msg) => AppError::Forbidden(msg),
            ServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text(), None)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(rejection.body_text(), None)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text(), Some("id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_validation_maps_to_bad_request_with_field() {
        let err: AppError = RepositoryError::invalid_field("coopId", "coop is full").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_service_forbidden_maps_to_403() {
        let err: AppError = ServiceError::Forbidden("not yours".into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_connection_error_is_internal() {
        let err: AppError = RepositoryError::connection("pool exhausted").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
