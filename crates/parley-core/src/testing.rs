//! In-memory repositories and mock providers shared by core unit tests.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use parley_types::chat::{ChatMessage, Conversation};
use parley_types::error::{IdentityError, RepositoryError};
use parley_types::identity::{Identity, IdentityId};
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, StreamEvent, Usage,
};

use crate::auth::credentials::CredentialHasher;
use crate::llm::provider::{LlmProvider, ProviderStream};
use crate::repository::chat::ChatRepository;
use crate::repository::identity::IdentityRepository;

// --- Repositories ---

#[derive(Default, Clone)]
pub struct MemoryIdentityRepo {
    identities: Arc<Mutex<Vec<Identity>>>,
}

impl IdentityRepository for MemoryIdentityRepo {
    fn create(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Identity, RepositoryError>> + Send {
        let mut rows = self.identities.lock().unwrap();
        let result = if rows.iter().any(|i| i.username == identity.username) {
            Err(RepositoryError::Conflict(identity.username.clone()))
        } else {
            rows.push(identity.clone());
            Ok(identity.clone())
        };
        drop(rows);
        async move { result }
    }

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Identity>, RepositoryError>> + Send {
        let found = self
            .identities
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.username == username)
            .cloned();
        async move { Ok(found) }
    }
}

#[derive(Default, Clone)]
pub struct MemoryChatRepo {
    conversations: Arc<Mutex<Vec<Conversation>>>,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl MemoryChatRepo {
    pub fn all_messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

impl ChatRepository for MemoryChatRepo {
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl Future<Output = Result<Conversation, RepositoryError>> + Send {
        self.conversations
            .lock()
            .unwrap()
            .push(conversation.clone());
        let conversation = conversation.clone();
        async move { Ok(conversation) }
    }

    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<Conversation>, RepositoryError>> + Send {
        let found = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == *id)
            .cloned();
        async move { Ok(found) }
    }

    fn list_conversations(
        &self,
        owner_id: &IdentityId,
    ) -> impl Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send {
        let mut owned: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.owner_id == *owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        async move { Ok(owned) }
    }

    fn delete_conversation(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let mut conversations = self.conversations.lock().unwrap();
        let before = conversations.len();
        conversations.retain(|c| c.id != *id);
        let deleted = conversations.len() < before;
        drop(conversations);
        if deleted {
            self.messages
                .lock()
                .unwrap()
                .retain(|m| m.conversation_id != *id);
        }
        async move {
            if deleted {
                Ok(())
            } else {
                Err(RepositoryError::NotFound)
            }
        }
    }

    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.messages.lock().unwrap().push(message.clone());
        async { Ok(()) }
    }

    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send {
        let mut rows: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        async move { Ok(rows) }
    }
}

// --- Credential hasher ---

/// Reversible "hash" so tests don't pay for a real KDF.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, IdentityError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, stored_hash: &str) -> bool {
        stored_hash.strip_prefix("plain:") == Some(password)
    }
}

// --- Providers ---

#[derive(Clone)]
pub enum MockBehavior {
    /// Reply with the given chunks, then `Done`.
    Reply(Vec<String>),
    /// Reply with the chunks, then fail mid-stream (no `Done`).
    FailAfter(Vec<String>),
    /// Reply with the chunks, then end quietly without `Done`.
    Truncated(Vec<String>),
    /// Fail immediately.
    Fail,
}

pub struct MockProvider {
    behavior: MockBehavior,
    chunk_delay: Duration,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            chunk_delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockBehavior::Reply(vec![text.to_string()]))
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Handle to the requests this provider has received.
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.requests.clone()
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        self.requests.lock().unwrap().push(request.clone());
        let behavior = self.behavior.clone();
        let model = request.model.clone();
        async move {
            match behavior {
                MockBehavior::Reply(chunks) => Ok(CompletionResponse {
                    content: chunks.concat(),
                    model,
                    stop_reason: StopReason::EndTurn,
                    usage: Usage {
                        input_tokens: 12,
                        output_tokens: 7,
                    },
                }),
                MockBehavior::FailAfter(_) | MockBehavior::Truncated(_) | MockBehavior::Fail => Err(LlmError::Provider {
                    message: "upstream exploded".to_string(),
                }),
            }
        }
    }

    fn stream(&self, request: CompletionRequest) -> ProviderStream {
        self.requests.lock().unwrap().push(request);
        let behavior = self.behavior.clone();
        let delay = self.chunk_delay;
        Box::pin(async_stream::stream! {
            match behavior {
                MockBehavior::Reply(chunks) => {
                    for chunk in chunks {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        yield Ok(StreamEvent::TextDelta { text: chunk });
                    }
                    yield Ok(StreamEvent::Done {
                        stop_reason: StopReason::EndTurn,
                        usage: Some(Usage { input_tokens: 12, output_tokens: 7 }),
                    });
                }
                MockBehavior::FailAfter(chunks) => {
                    for chunk in chunks {
                        yield Ok(StreamEvent::TextDelta { text: chunk });
                    }
                    yield Err(LlmError::Stream("connection reset".to_string()));
                }
                MockBehavior::Truncated(chunks) => {
                    for chunk in chunks {
                        yield Ok(StreamEvent::TextDelta { text: chunk });
                    }
                }
                MockBehavior::Fail => {
                    yield Err(LlmError::AuthenticationFailed);
                }
            }
        })
    }
}
