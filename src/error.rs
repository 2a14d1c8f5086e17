use axum::http::StatusCode;
use thiserror::Error;

/// Generic credential failure; identical for unknown email and wrong password.
pub const LOGIN_FAILED: &str = "Unable to login";
/// Missing, malformed, revoked or foreign session token.
pub const NOT_AUTHENTICATED: &str = "Please authenticate";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique field `{field}`")]
    Duplicate { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(&'static str),

    #[error(transparent)]
    Store(StoreError),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token expiry out of range")]
    TokenExpiry,
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field: "email" } => {
                Self::Validation("Email is already registered".into())
            }
            other => Self::Store(other),
        }
    }
}

impl AccountError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Hash(_) | Self::Token(_) | Self::TokenExpiry => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Handler rejection: status plus a message that is safe to show the client.
pub fn reject(err: AccountError) -> (StatusCode, String) {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
        return (status, "Internal server error".into());
    }
    (status, err.to_string())
}
