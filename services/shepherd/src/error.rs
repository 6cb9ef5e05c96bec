//! Caller-facing error taxonomy.
//!
//! Every failure a handler can produce maps to one of these kinds and a
//! stable HTTP response. Two rules matter for account enumeration:
//! `InvalidCredentials` uses one message whether the identity is unknown,
//! inactive, or the password mismatched, and `InvalidToken` uses one message
//! for verification, reset, and refresh tokens alike.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address is not verified")]
    EmailUnverified,

    #[error("Multi-factor code required")]
    MfaRequired,

    #[error("Invalid multi-factor code")]
    InvalidMfaCode,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("An account with this email already exists")]
    DuplicateIdentity,

    #[error("Multi-factor authentication is already enabled")]
    AlreadyEnabled,

    #[error("Email address is already verified")]
    AlreadyVerified,

    #[error("Account is not pending approval")]
    NotPending,

    #[error("Forbidden")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::AlreadyEnabled | Self::AlreadyVerified | Self::NotPending => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials
            | Self::MfaRequired
            | Self::InvalidMfaCode
            | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::EmailUnverified | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateIdentity => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if let Self::Internal(detail) = &self {
            // The detail goes to the log; callers get a generic message.
            error!("request failed: {detail}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}
