//! Ownership guard for conversation-scoped operations.

use tracing::warn;
use uuid::Uuid;

use parley_types::chat::Conversation;
use parley_types::error::ChatError;
use parley_types::identity::IdentityId;

use crate::repository::chat::ChatRepository;

/// Load a conversation on behalf of `identity`.
///
/// A conversation that does not exist and one owned by someone else both
/// produce `ChatError::NotFound`, so callers cannot probe for other users' ids.
pub async fn check_ownership<C: ChatRepository>(
    repo: &C,
    identity: IdentityId,
    conversation_id: &Uuid,
) -> Result<Conversation, ChatError> {
    match repo.get_conversation(conversation_id).await? {
        Some(conversation) if conversation.owner_id == identity => Ok(conversation),
        Some(_) => {
            warn!(
                identity_id = %identity,
                conversation_id = %conversation_id,
                "conversation access denied"
            );
            Err(ChatError::NotFound)
        }
        None => Err(ChatError::NotFound),
    }
}
