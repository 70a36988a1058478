use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::dto::MessageResponse;
use super::repo::RepoError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    DuplicateUser,
    #[error("Invalid Token")]
    InvalidToken,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("persistence error: {0}")]
    Persistence(#[source] sqlx::Error),
    #[error("mail error: {0:#}")]
    Mail(anyhow::Error),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateUser
            | AuthError::InvalidToken
            | AuthError::InvalidOrExpiredToken
            | AuthError::UserNotFound
            | AuthError::InvalidCredentials
            | AuthError::EmailNotVerified
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Persistence(_)
            | AuthError::Mail(_)
            | AuthError::Signing(_)
            | AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate => AuthError::DuplicateUser,
            RepoError::Db(e) => AuthError::Persistence(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Infrastructure details stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Server Error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}
