//! Error taxonomy shared by the store, the service and the decay engine.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, ReputationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReputationError {
    /// The operation required an existing record and none was present
    #[error("no reputation entry for {0}")]
    NotFound(String),

    /// Strict create against a key that already has a record
    #[error("reputation is already set for {0}")]
    AlreadyExists(String),

    /// Backing store I/O failure or timeout. Never retried internally.
    #[error("reputation store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed request, rejected before the store is touched
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ReputationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReputationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReputationError::AlreadyExists(_) => StatusCode::CONFLICT,
            ReputationError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ReputationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ReputationError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for ReputationError {
    fn from(err: sqlx::Error) -> Self {
        ReputationError::StoreUnavailable(err.to_string())
    }
}

impl IntoResponse for ReputationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "Request failed against the reputation store");
        }
        (status, self.to_string()).into_response()
    }
}
