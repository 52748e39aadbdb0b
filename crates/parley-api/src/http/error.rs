//! Application error type mapping to HTTP status codes.
//!
//! Bodies are `{"error": <message>, "code": <CODE>}`. Messages for server-side
//! failures are fixed strings; the underlying detail is logged, never sent.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::error::{ChatError, IdentityError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Conversation and chat-turn errors.
    Chat(ChatError),
    /// Registration and login errors.
    Identity(IdentityError),
    /// Missing or invalid session.
    Unauthorized,
    /// Too many message sends from one client.
    RateLimited,
    /// Malformed request input.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        AppError::Identity(e)
    }
}

const GENERIC_FAILURE: &str = "Internal server error";

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::Validation(msg))
            | AppError::Identity(IdentityError::Validation(msg))
            | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Not found or unauthorized".to_string(),
            ),
            AppError::Chat(ChatError::Misconfigured) => {
                tracing::error!("request failed: completion provider not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MISCONFIGURED",
                    "Service misconfigured".to_string(),
                )
            }
            AppError::Chat(ChatError::Upstream(detail)) => {
                tracing::error!(error = %detail, "request failed: upstream provider");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_ERROR",
                    GENERIC_FAILURE.to_string(),
                )
            }
            AppError::Chat(ChatError::Repository(e)) => {
                tracing::error!(error = %e, "request failed: storage");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERIC_FAILURE.to_string(),
                )
            }
            AppError::Identity(IdentityError::InvalidCredentials) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            AppError::Identity(IdentityError::Conflict) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                "Username already taken".to_string(),
            ),
            AppError::Identity(e @ (IdentityError::Hashing(_) | IdentityError::Repository(_))) => {
                tracing::error!(error = %e, "request failed: identity");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERIC_FAILURE.to_string(),
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests".to_string(),
            ),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERIC_FAILURE.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
