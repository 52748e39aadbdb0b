//! HTTP request handlers.

pub mod auth;
pub mod chat;
pub mod conversations;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use uuid::Uuid;

use crate::http::error::AppError;

/// Unwrap a JSON body, turning axum's rejection into a 400 with our error shape.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Parse a conversation id supplied by the client.
pub(crate) fn parse_conversation_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation("Invalid conversation id".to_string()))
}
