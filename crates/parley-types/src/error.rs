use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from minting session tokens.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Errors from registration and login.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid input: {0}")]
    Validation(String),

    /// Unknown username and wrong password are deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username already taken")]
    Conflict,

    #[error("credential hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from conversation operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    Validation(String),

    /// Absent and not-owned conversations share this variant.
    #[error("not found or unauthorized")]
    NotFound,

    #[error("no completion provider configured")]
    Misconfigured,

    #[error("upstream provider failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Repository(other),
        }
    }
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::Upstream(err.to_string())
    }
}
