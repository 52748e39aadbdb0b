//! ChatRepository trait definition.
//!
//! Provides create/read/delete operations for conversations and append-only
//! message storage. Follows the same RPITIT pattern as IdentityRepository.
//!
//! Nothing here checks ownership; callers go through
//! [`crate::chat::ownership::check_ownership`] first.

use parley_types::chat::{ChatMessage, Conversation};
use parley_types::error::RepositoryError;
use parley_types::identity::IdentityId;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
pub trait ChatRepository: Send + Sync {
    /// Create a new conversation.
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by its unique ID.
    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List an owner's conversations, newest first.
    fn list_conversations(
        &self,
        owner_id: &IdentityId,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Delete a conversation and, by cascade, all of its messages.
    ///
    /// Returns `RepositoryError::NotFound` if no row was deleted.
    fn delete_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a message to a conversation.
    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages of a conversation in creation order (ties broken by id).
    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
