//! HTTP error type for imgeval-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid input (400)
    #[error("Invalid request: {message}")]
    BadRequest {
        message: String,
        field: Option<String>,
    },

    /// No resolvable caller identity (401)
    #[error("Authentication required")]
    Unauthenticated,

    /// Caller may not act on the resource (403); detail stays in the log
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate evaluation of the same image (400)
    #[error("Image already evaluated")]
    AlreadyEvaluated,

    /// Conflict (409), e.g. an assignment for the pair already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500); detail stays in the log
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl From<imgeval_common::Error> for ApiError {
    fn from(err: imgeval_common::Error) -> Self {
        use imgeval_common::Error;

        match err {
            Error::Validation { field, message } => ApiError::BadRequest {
                message,
                field: Some(field),
            },
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::Unauthorized(reason) => ApiError::Forbidden(reason),
            Error::AlreadyEvaluated => ApiError::AlreadyEvaluated,
            Error::Conflict(what) => ApiError::Conflict(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(imgeval_common::Error::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match self {
            ApiError::BadRequest { message, field } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message, field)
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::Forbidden(reason) => {
                warn!("Request forbidden: {}", reason);
                (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "You are not authorized to perform this action".to_string(),
                    None,
                )
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", what),
                None,
            ),
            ApiError::AlreadyEvaluated => (
                StatusCode::BAD_REQUEST,
                "ALREADY_EVALUATED",
                "You have already evaluated this image".to_string(),
                None,
            ),
            ApiError::Conflict(what) => (StatusCode::CONFLICT, "CONFLICT", what, None),
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "success": false,
            "code": code,
            "message": message,
        });
        if let Some(field) = field {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use imgeval_common::Error;

    #[test]
    fn test_taxonomy_maps_to_status() {
        let cases = [
            (
                ApiError::from(Error::validation("confidence", "out of range")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(Error::NotFound("Image 3".into())), StatusCode::NOT_FOUND),
            (
                ApiError::from(Error::Unauthorized("not assigned".into())),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::from(Error::AlreadyEvaluated), StatusCode::BAD_REQUEST),
            (ApiError::from(Error::Conflict("pair".into())), StatusCode::CONFLICT),
            (
                ApiError::from(Error::Internal("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_validation_keeps_field() {
        match ApiError::from(Error::validation("image_id", "required")) {
            ApiError::BadRequest { field, .. } => assert_eq!(field.as_deref(), Some("image_id")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
