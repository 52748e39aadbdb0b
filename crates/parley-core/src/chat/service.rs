//! Chat service orchestrating conversation turns and message persistence.
//!
//! A turn moves through `Pending` (user message saved) to `ProviderCalled`
//! and ends `Completed` (assistant message saved) or `Failed` (nothing more
//! saved). The user message is never rolled back and nothing is retried.
//!
//! Streaming turns run on their own task: it forwards chunks to the caller
//! through a channel while buffering the full text, and performs the single
//! durable write when the provider signals end of turn. If the caller goes
//! away the task keeps draining the provider and still persists. These tasks
//! are tracked so shutdown can wait for them with [`ChatService::drain`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_types::chat::{
    ChatMessage, ChatReply, ChatStreamEvent, Conversation, ConversationSummary, IncomingMessage,
    MessageRole, truncate_chars,
};
use parley_types::config::{ChatConfig, ProviderConfig};
use parley_types::error::ChatError;
use parley_types::identity::IdentityId;
use parley_types::llm::{CompletionRequest, Message, StreamEvent};

use crate::chat::ownership::check_ownership;
use crate::llm::box_provider::BoxLlmProvider;
use crate::repository::chat::ChatRepository;

/// Capacity of the per-turn event channel.
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Message shown to clients when a streamed turn fails.
const STREAM_FAILURE_MESSAGE: &str = "Failed to get a reply";

/// What the caller supplies for a streaming turn.
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// A single new user message; the stored transcript is the context.
    Message(String),
    /// A full message list whose last entry is the new user message; the
    /// list itself is the context.
    History(Vec<IncomingMessage>),
}

/// How a streamed turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Persisted { message_id: Uuid },
    Failed,
}

/// Handle to a streaming turn in progress.
#[derive(Debug)]
pub struct ChatStream {
    pub conversation_id: Uuid,
    /// `Conversation` first, then `TextDelta`s, then `Completed` or `Failed`.
    pub events: mpsc::Receiver<ChatStreamEvent>,
    /// Resolves once the turn has been persisted or abandoned. Dropping it
    /// does not cancel the turn; the service still tracks it.
    pub finalizer: JoinHandle<TurnOutcome>,
}

/// Orchestrates conversation turns against a repository and a provider.
///
/// `provider` is `None` when no provider credential is configured; every turn
/// then fails with `Misconfigured` before touching storage.
pub struct ChatService<C: ChatRepository + 'static> {
    repo: Arc<C>,
    provider: Option<BoxLlmProvider>,
    chat: ChatConfig,
    provider_config: ProviderConfig,
    turns: TaskTracker,
}

impl<C: ChatRepository + 'static> ChatService<C> {
    pub fn new(
        repo: C,
        provider: Option<BoxLlmProvider>,
        chat: ChatConfig,
        provider_config: ProviderConfig,
    ) -> Self {
        Self {
            repo: Arc::new(repo),
            provider,
            chat,
            provider_config,
            turns: TaskTracker::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    // --- Turns ---

    /// Run a blocking turn: save the user message, send the stored
    /// transcript to the provider, save and return the reply.
    pub async fn converse(
        &self,
        identity: IdentityId,
        conversation_id: Option<Uuid>,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        self.validate_message(message)?;
        let provider = self.provider()?;

        let conversation = self.open_conversation(identity, conversation_id, message).await?;
        self.save_user_message(conversation.id, message).await?;

        let transcript = self.load_transcript(&conversation.id).await?;
        let request = self.build_request(transcript, false);

        let started = Instant::now();
        let response = provider.complete(&request).await.map_err(|e| {
            error!(conversation_id = %conversation.id, error = %e, "completion failed");
            ChatError::from(e)
        })?;

        if response.content.trim().is_empty() {
            warn!(conversation_id = %conversation.id, "provider returned an empty completion");
            return Err(ChatError::Upstream("empty completion".to_string()));
        }

        let assistant = ChatMessage {
            model: Some(response.model.clone()),
            input_tokens: Some(response.usage.input_tokens),
            output_tokens: Some(response.usage.output_tokens),
            stop_reason: Some(response.stop_reason.to_string()),
            response_ms: Some(started.elapsed().as_millis() as u64),
            ..ChatMessage::plain(conversation.id, MessageRole::Assistant, response.content)
        };
        self.repo.save_message(&assistant).await?;

        info!(
            identity_id = %identity,
            conversation_id = %conversation.id,
            response_ms = assistant.response_ms,
            "turn completed"
        );

        Ok(ChatReply {
            reply: assistant.content,
            conversation_id: conversation.id,
        })
    }

    /// Start a streaming turn.
    ///
    /// Validation, conversation resolution and the user-message write happen
    /// before this returns; everything after the provider call happens on
    /// the spawned finalizer.
    pub async fn converse_stream(
        &self,
        identity: IdentityId,
        conversation_id: Option<Uuid>,
        input: TurnInput,
    ) -> Result<ChatStream, ChatError> {
        let user_text = self.validate_input(&input)?.to_string();
        let provider = self.provider()?.clone();

        let conversation = self
            .open_conversation(identity, conversation_id, &user_text)
            .await?;
        self.save_user_message(conversation.id, &user_text).await?;

        let context = match input {
            TurnInput::Message(_) => self.load_transcript(&conversation.id).await?,
            TurnInput::History(entries) => entries
                .into_iter()
                .map(|m| Message {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
        };
        let request = self.build_request(context, true);

        let (tx, events) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        // The channel is fresh, so the first event always fits.
        let _ = tx.try_send(ChatStreamEvent::Conversation {
            conversation_id: conversation.id,
        });

        let finalizer = self.turns.spawn(drive_stream(
            self.repo.clone(),
            provider,
            request,
            conversation.id,
            tx,
        ));

        Ok(ChatStream {
            conversation_id: conversation.id,
            events,
            finalizer,
        })
    }

    /// Wait for streamed turns still in flight, e.g. after the server stopped
    /// accepting requests. Returns `false` if some were running at `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.turns.close();
        let pending = self.turns.len();
        if pending > 0 {
            info!(pending, "waiting for streamed turns to finish");
        }
        match tokio::time::timeout(timeout, self.turns.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(pending = self.turns.len(), "streamed turns still running at shutdown");
                false
            }
        }
    }

    // --- Conversation management ---

    /// The identity's conversations, most recent first.
    pub async fn list_conversations(
        &self,
        identity: IdentityId,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let conversations = self.repo.list_conversations(&identity).await?;
        Ok(conversations.into_iter().map(ConversationSummary::from).collect())
    }

    /// All messages of an owned conversation in transcript order.
    pub async fn get_transcript(
        &self,
        identity: IdentityId,
        conversation_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        check_ownership(self.repo.as_ref(), identity, conversation_id).await?;
        Ok(self.repo.list_messages(conversation_id).await?)
    }

    /// Delete an owned conversation and all of its messages.
    pub async fn delete_conversation(
        &self,
        identity: IdentityId,
        conversation_id: &Uuid,
    ) -> Result<(), ChatError> {
        check_ownership(self.repo.as_ref(), identity, conversation_id).await?;
        self.repo.delete_conversation(conversation_id).await?;
        info!(identity_id = %identity, conversation_id = %conversation_id, "conversation deleted");
        Ok(())
    }

    // --- Helpers ---

    fn provider(&self) -> Result<&BoxLlmProvider, ChatError> {
        self.provider.as_ref().ok_or_else(|| {
            error!("chat turn refused: no completion provider configured");
            ChatError::Misconfigured
        })
    }

    fn validate_message(&self, message: &str) -> Result<(), ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::Validation("message is required".to_string()));
        }
        if message.chars().count() > self.chat.max_message_chars {
            return Err(ChatError::Validation("message is too long".to_string()));
        }
        Ok(())
    }

    /// Validate a streaming input and return the new user message text.
    fn validate_input<'a>(&self, input: &'a TurnInput) -> Result<&'a str, ChatError> {
        match input {
            TurnInput::Message(message) => {
                self.validate_message(message)?;
                Ok(message)
            }
            TurnInput::History(entries) => {
                let Some(last) = entries.last() else {
                    return Err(ChatError::Validation("messages must not be empty".to_string()));
                };
                if entries.len() > self.chat.max_history {
                    return Err(ChatError::Validation(format!(
                        "at most {} messages allowed",
                        self.chat.max_history
                    )));
                }
                if entries
                    .iter()
                    .any(|m| m.content.chars().count() > self.chat.max_message_chars)
                {
                    return Err(ChatError::Validation("message is too long".to_string()));
                }
                if last.role != MessageRole::User {
                    return Err(ChatError::Validation(
                        "last message must have role 'user'".to_string(),
                    ));
                }
                self.validate_message(&last.content)?;
                Ok(&last.content)
            }
        }
    }

    /// Create a new conversation or load an owned one.
    async fn open_conversation(
        &self,
        identity: IdentityId,
        conversation_id: Option<Uuid>,
        first_message: &str,
    ) -> Result<Conversation, ChatError> {
        match conversation_id {
            Some(id) => check_ownership(self.repo.as_ref(), identity, &id).await,
            None => {
                let conversation = Conversation {
                    id: Uuid::now_v7(),
                    owner_id: identity,
                    title: Some(truncate_chars(first_message, self.chat.title_chars)),
                    created_at: Utc::now(),
                };
                let conversation = self.repo.create_conversation(&conversation).await?;
                info!(
                    identity_id = %identity,
                    conversation_id = %conversation.id,
                    "conversation created"
                );
                Ok(conversation)
            }
        }
    }

    async fn save_user_message(&self, conversation_id: Uuid, content: &str) -> Result<(), ChatError> {
        let message = ChatMessage::plain(conversation_id, MessageRole::User, content.to_string());
        self.repo.save_message(&message).await?;
        Ok(())
    }

    async fn load_transcript(&self, conversation_id: &Uuid) -> Result<Vec<Message>, ChatError> {
        let history = self.repo.list_messages(conversation_id).await?;
        Ok(history
            .into_iter()
            .map(|m| Message {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    fn build_request(&self, messages: Vec<Message>, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.provider_config.model.clone(),
            messages,
            max_tokens: self.provider_config.max_tokens,
            temperature: Some(self.provider_config.temperature),
            stream,
        }
    }
}

/// Drain the provider stream, forwarding chunks while the receiver is alive,
/// and persist the assistant message once on a clean end of turn.
async fn drive_stream<C: ChatRepository>(
    repo: Arc<C>,
    provider: BoxLlmProvider,
    request: CompletionRequest,
    conversation_id: Uuid,
    tx: mpsc::Sender<ChatStreamEvent>,
) -> TurnOutcome {
    let started = Instant::now();
    let model = request.model.clone();
    let mut stream = provider.stream(request);

    let mut text = String::new();
    let mut finish = None;
    let mut forwarding = true;

    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::TextDelta { text: chunk }) => {
                text.push_str(&chunk);
                if forwarding && tx.send(ChatStreamEvent::TextDelta { text: chunk }).await.is_err() {
                    debug!(%conversation_id, "stream receiver dropped; still accumulating");
                    forwarding = false;
                }
            }
            Ok(StreamEvent::Done { stop_reason, usage }) => {
                finish = Some((stop_reason, usage));
                break;
            }
            Err(e) => {
                error!(%conversation_id, error = %e, "provider stream failed");
                break;
            }
        }
    }

    let (stop_reason, usage) = match finish {
        Some(finish) if !text.trim().is_empty() => finish,
        _ => {
            warn!(%conversation_id, finished = finish.is_some(), "streamed turn not persisted");
            let _ = tx
                .send(ChatStreamEvent::Failed {
                    message: STREAM_FAILURE_MESSAGE.to_string(),
                })
                .await;
            return TurnOutcome::Failed;
        }
    };

    let assistant = ChatMessage {
        model: Some(model),
        input_tokens: usage.map(|u| u.input_tokens),
        output_tokens: usage.map(|u| u.output_tokens),
        stop_reason: Some(stop_reason.to_string()),
        response_ms: Some(started.elapsed().as_millis() as u64),
        ..ChatMessage::plain(conversation_id, MessageRole::Assistant, text)
    };

    if let Err(e) = repo.save_message(&assistant).await {
        error!(%conversation_id, error = %e, "failed to persist streamed reply");
        let _ = tx
            .send(ChatStreamEvent::Failed {
                message: STREAM_FAILURE_MESSAGE.to_string(),
            })
            .await;
        return TurnOutcome::Failed;
    }

    info!(%conversation_id, message_id = %assistant.id, "streamed turn completed");
    let _ = tx
        .send(ChatStreamEvent::Completed {
            message_id: assistant.id,
        })
        .await;

    TurnOutcome::Persisted {
        message_id: assistant.id,
    }
}
