//! Application error type shared by every handler.
//!
//! Each variant maps to one error kind callers can branch on
//! programmatically; the response body is always
//! `{"error": {"kind": "...", "message": "..."}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    AlreadyDone(String),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_)   => "validation",
            AppError::Unauthorized    => "unauthorized",
            AppError::Forbidden       => "forbidden",
            AppError::NotFound        => "not_found",
            AppError::Conflict(_)     => "conflict",
            AppError::AlreadyDone(_)  => "already_done",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Internal(_)     => "server",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)   => StatusCode::BAD_REQUEST,
            AppError::Unauthorized    => StatusCode::UNAUTHORIZED,
            AppError::Forbidden       => StatusCode::FORBIDDEN,
            AppError::NotFound        => StatusCode::NOT_FOUND,
            AppError::Conflict(_)     => StatusCode::CONFLICT,
            AppError::AlreadyDone(_)  => StatusCode::CONFLICT,
            AppError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_)     => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Storage/unexpected failures are logged in full and surfaced opaquely.
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "error": { "kind": self.kind(), "message": message } });
        (self.status(), Json(body)).into_response()
    }
}

/// True when the database rejected a write on a `UNIQUE` key.
/// Uniqueness invariants (booking slot, attendance day, staff phone/NID)
/// are enforced at the storage layer; callers map this to a domain-specific
/// `Conflict`/`AlreadyDone` at the write site.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return AppError::Conflict("A record with the same unique value already exists".into());
        }
        AppError::Internal(anyhow::anyhow!(err))
    }
}
