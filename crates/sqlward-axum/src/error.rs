//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlward_infra::Error;

use crate::response::{ApiResponse, request_id};

/// Error returned by handlers built on sqlward repositories.
#[derive(Debug)]
pub enum ApiError {
    /// Anything raised by a session, repository or query.
    Db(Error),
    /// Request input rejected before touching the database.
    Validation(String),
    /// A resource the handler looked up by hand was missing.
    NotFound(String),
    /// The write would clash with an existing row.
    Conflict(String),
    /// Generic internal error.
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Db(e)
    }
}

impl ApiError {
    /// Status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Db(e @ Error::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            }
            ApiError::Db(e @ Error::MultipleResults { .. }) => {
                (StatusCode::CONFLICT, "MULTIPLE_RESULTS", e.to_string())
            }
            ApiError::Db(e @ Error::Query(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_QUERY", e.to_string())
            }
            ApiError::Db(e @ (Error::InvalidPage(_) | Error::InvalidPageToken(_))) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            ApiError::Db(e) => {
                tracing::error!(error = %e, "database error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        ApiResponse::error(code, &message, request_id()).into_response_with(status)
    }
}
