//! Error types for kq-api
//!
//! Module-specific error type using thiserror, mapped onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::queue::ordering::OrderError;

/// Main error type for kq-api
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Event is canceled or archived
    #[error("Event closed: {0}")]
    EventClosed(String),

    /// Queue ordering rejected
    #[error("Queue order error: {0}")]
    Order(#[from] OrderError),

    /// Stored data could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using kq-api Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<kq_common::Error> for Error {
    fn from(err: kq_common::Error) -> Self {
        match err {
            kq_common::Error::Database(e) => Error::Database(e),
            kq_common::Error::Io(e) => Error::Internal(e.to_string()),
            kq_common::Error::Config(msg) => Error::Config(msg),
            kq_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) | Error::EventClosed(_) => StatusCode::CONFLICT,
            Error::Order(e) if e.is_stale() => StatusCode::CONFLICT,
            Error::Order(_) => StatusCode::BAD_REQUEST,
            Error::Config(_)
            | Error::Database(_)
            | Error::Corrupt(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
