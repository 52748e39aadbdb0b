//! Conversation, message, and chat-turn types for Parley.
//!
//! A conversation is an owned, append-only thread of messages. Messages are
//! ordered by `created_at` within a conversation (ties broken by the
//! time-sortable id) and that order is the transcript sent to the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::IdentityId;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Title shown for conversations that have no title yet.
pub const UNTITLED_CONVERSATION: &str = "Empty Conversation";

/// A conversation owned by exactly one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: IdentityId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single message within a conversation.
///
/// Assistant messages carry provider metadata; user and system messages
/// leave those fields empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ms: Option<u64>,
}

impl ChatMessage {
    /// A message with no provider metadata.
    pub fn plain(conversation_id: Uuid, role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role,
            content,
            created_at: Utc::now(),
            model: None,
            input_tokens: None,
            output_tokens: None,
            stop_reason: None,
            response_ms: None,
        }
    }
}

/// Listing entry returned by `GET /conversations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
}

impl From<Conversation> for ConversationSummary {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            created_at: c.created_at,
            title: c
                .title
                .unwrap_or_else(|| UNTITLED_CONVERSATION.to_string()),
        }
    }
}

/// A message supplied by the caller in the streaming variant of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Result of a completed non-streaming turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub conversation_id: Uuid,
}

/// Events delivered to the caller of a streaming turn.
///
/// `Conversation` is always first and carries the id out of band from the
/// reply text. Exactly one of `Completed` or `Failed` ends the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Conversation { conversation_id: Uuid },
    TextDelta { text: String },
    Completed { message_id: Uuid },
    Failed { message: String },
}

/// Truncate `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
