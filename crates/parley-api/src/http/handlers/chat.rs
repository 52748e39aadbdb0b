//! Chat endpoints.
//!
//! GET  /chat?conversationId=  -- the ordered transcript of an owned conversation
//! POST /chat                  -- send a message, blocking or streamed
//!
//! A POST with `messages` or `"stream": true` answers with Server-Sent Events:
//! - `conversation` -- first event: `{ "conversationId": "..." }`
//! - `text_delta` -- incremental text: `{ "text": "..." }`
//! - `done` -- reply persisted: `{ "messageId": "..." }`
//! - `error` -- turn failed: `{ "message": "..." }`
//!
//! The conversation id is also sent as the `X-Conversation-Id` header.
//! Persistence of the streamed reply does not depend on the client staying
//! connected.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::{HeaderMap, HeaderName};
use axum::http::request::Parts;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{AppendHeaders, IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use parley_core::chat::service::{ChatStream, TurnInput};
use parley_types::chat::{ChatMessage, ChatStreamEvent, IncomingMessage};

use super::{json_body, parse_conversation_id};
use crate::http::error::AppError;
use crate::http::gateway::CurrentIdentity;
use crate::state::AppState;

const X_CONVERSATION_ID: HeaderName = HeaderName::from_static("x-conversation-id");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptQuery {
    pub conversation_id: Option<String>,
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// A single new user message.
    pub message: Option<String>,
    /// A full message list whose last entry is the new user message.
    pub messages: Option<Vec<IncomingMessage>>,
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

/// Rate-limit key for the calling client.
///
/// The socket peer address. Forwarding headers are only consulted when
/// `rate_limit.trust_proxy` is set, since any client can send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey(client_key(
            &parts.headers,
            peer,
            state.config.rate_limit.trust_proxy,
        )))
    }
}

/// Behind a trusted proxy the rightmost `X-Forwarded-For` entry is the one
/// the proxy appended; everything left of it came from the client.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = || {
        headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .last()
    };
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    trust_proxy
        .then(|| forwarded().or_else(real_ip))
        .flatten()
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// GET /chat?conversationId=
pub async fn get_transcript(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let raw = query
        .conversation_id
        .ok_or_else(|| AppError::Validation("conversationId is required".to_string()))?;
    let conversation_id = parse_conversation_id(&raw)?;

    let messages = state
        .chat_service
        .get_transcript(identity, &conversation_id)
        .await?;
    Ok(Json(messages))
}

/// POST /chat
pub async fn post_chat(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ClientKey(client): ClientKey,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    if !state.rate_limiter.allow(&client) {
        tracing::warn!(key = %client, identity_id = %identity, "chat rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    let body = json_body(body)?;
    let conversation_id = body
        .conversation_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(parse_conversation_id)
        .transpose()?;

    let streaming = body.stream || body.messages.is_some();
    if !streaming {
        let message = body.message.unwrap_or_default();
        let reply = state
            .chat_service
            .converse(identity, conversation_id, &message)
            .await?;
        return Ok(Json(reply).into_response());
    }

    let input = match body.messages {
        Some(messages) => TurnInput::History(messages),
        None => TurnInput::Message(body.message.unwrap_or_default()),
    };

    // The finalizer handle is dropped here; the service tracks the turn
    // until it is persisted, and shutdown drains it.
    let ChatStream {
        conversation_id,
        mut events,
        ..
    } = state
        .chat_service
        .converse_stream(identity, conversation_id, input)
        .await?;

    let sse_stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            yield Ok::<_, Infallible>(sse_event(event));
        }
    };

    Ok((
        AppendHeaders([(X_CONVERSATION_ID, conversation_id.to_string())]),
        Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))),
    )
        .into_response())
}

fn sse_event(event: ChatStreamEvent) -> Event {
    let (name, data) = match event {
        ChatStreamEvent::Conversation { conversation_id } => {
            ("conversation", json!({ "conversationId": conversation_id }))
        }
        ChatStreamEvent::TextDelta { text } => ("text_delta", json!({ "text": text })),
        ChatStreamEvent::Completed { message_id } => ("done", json!({ "messageId": message_id })),
        ChatStreamEvent::Failed { message } => ("error", json!({ "message": message })),
    };
    Event::default().event(name).data(data.to_string())
}
