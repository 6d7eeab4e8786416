use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{auth::repo::StoreError, mail::MailError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    NotFound,

    #[error("Password reset token is invalid or has expired.")]
    InvalidOrExpiredToken,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Admin access required")]
    Forbidden,

    #[error("email transport error: {0}")]
    EmailTransport(#[from] MailError),

    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            other => AuthError::Storage(other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::DuplicateEmail
            | AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::EmailTransport(_) | AuthError::Storage(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::EmailTransport(_) | AuthError::Storage(_) | AuthError::Internal(_) => {
                error!(error = %self, "request failed");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
