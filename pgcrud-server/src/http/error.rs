//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.
//! Database details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::{DbError, SessionError};
use crate::lifecycle::ReadinessState;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Unique constraint hit (400)
    AlreadyExists { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Database not usable yet (503)
    NotReady { state: ReadinessState },

    /// Ready, but no connection could be checked out (503)
    Unavailable { reason: &'static str },

    /// Database error (500, logged)
    Database(DbError),

    /// Session begin/commit failed for another reason (500, logged)
    Session(SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": e.to_string()
                }),
            ),
            Self::AlreadyExists { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "already_exists",
                    "message": message
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::NotReady { state } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "not_ready",
                    "message": "database is not ready",
                    "state": state
                }),
            ),
            Self::Unavailable { reason } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "not_ready",
                    "message": reason
                }),
            ),
            Self::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }
            Self::Session(e) => {
                tracing::error!("Session error: {}", e);
                internal_error()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal_error() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({
            "error": "internal_error",
            "message": "an internal error occurred"
        }),
    )
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Begin(ref cause) if checkout_unavailable(cause) => {
                tracing::warn!(error = %cause, "no database connection available");
                Self::Unavailable {
                    reason: "no database connection available",
                }
            }
            other => Self::Session(other),
        }
    }
}

/// Pool exhausted, closed, or the server refused the connection.
fn checkout_unavailable(cause: &sqlx::Error) -> bool {
    matches!(
        cause,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict { .. } => Self::AlreadyExists {
                message: e.to_string(),
            },
            _ => Self::Database(e),
        }
    }
}
