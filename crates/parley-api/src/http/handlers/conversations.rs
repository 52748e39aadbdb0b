//! Conversation listing and deletion.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use parley_types::chat::ConversationSummary;

use super::parse_conversation_id;
use crate::http::error::AppError;
use crate::http::gateway::CurrentIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

/// GET /conversations -- the caller's conversations, newest first.
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = state.chat_service.list_conversations(identity).await?;
    Ok(Json(conversations))
}

/// DELETE /conversations?id=
pub async fn delete_conversation(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let raw = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Conversation id is required".to_string()))?;
    let conversation_id = parse_conversation_id(&raw)?;

    state
        .chat_service
        .delete_conversation(identity, &conversation_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
