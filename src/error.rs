//! Error taxonomy for the vault core.
//!
//! Every store and auth operation returns `VaultError` so the gateway can
//! map failures to HTTP statuses mechanically. `Internal` carries the full
//! cause for server-side logging but is never shown to the caller.

use axum::http::StatusCode;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Missing or malformed fields, weak password. Reported, never retried.
    #[error("{0}")]
    InvalidInput(String),

    /// Duplicate username.
    #[error("{0}")]
    Conflict(String),

    /// Unknown user or wrong password. One message for both, so callers
    /// cannot tell which factor failed.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Missing, invalid, or expired identity proof.
    #[error("Authentication required")]
    Unauthorized,

    /// No record with that id for that owner. Existence under a different
    /// owner is indistinguishable from non-existence.
    #[error("Record not found")]
    NotFound,

    /// Too many attempts from one origin. No side effects were performed.
    #[error("Too many requests. Please retry later.")]
    RateLimited,

    /// Unexpected storage or derivation failure. Logged with full detail,
    /// surfaced as an opaque generic message.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl VaultError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller. Identical to `Display` except
    /// for `Internal`, whose cause stays server-side.
    pub fn public_message(&self) -> String {
        self.to_string()
    }
}

impl axum::response::IntoResponse for VaultError {
    fn into_response(self) -> axum::response::Response {
        if let Self::Internal(cause) = &self {
            tracing::error!(error = ?cause, "internal error");
        }
        let body = axum::Json(serde_json::json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(anyhow::Error::new(e).context("storage operation failed"))
    }
}
