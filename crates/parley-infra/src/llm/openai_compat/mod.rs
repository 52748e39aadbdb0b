//! Completion provider for OpenAI and servers speaking its chat completions
//! protocol (set `base_url` to point elsewhere).

pub mod config;
pub mod streaming;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use futures_util::{StreamExt, stream};
use secrecy::ExposeSecret;

use parley_core::llm::provider::{LlmProvider, ProviderStream};
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, StopReason, Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::{map_finish_reason, map_openai_stream};

/// No `Debug`: the client carries the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(config.api_key.expose_secret())
                .with_api_base(&config.base_url),
        );

        Self {
            client,
            provider_name: config.provider_name,
            model: config.model,
        }
    }

    fn build_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest("no messages to send".to_string()));
        }

        let model = match request.model.as_str() {
            "" => self.model.clone(),
            model => model.to_string(),
        };

        Ok(CreateChatCompletionRequest {
            model,
            messages: request.messages.iter().map(to_openai_message).collect(),
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            stream: stream.then_some(true),
            stream_options: stream.then_some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            }),
            ..Default::default()
        })
    }
}

fn to_openai_message(message: &Message) -> ChatCompletionRequestMessage {
    let text = message.content.clone();
    match message.role {
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            })
        }
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }),
        #[allow(deprecated)]
        MessageRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .chat()
            .create(self.build_request(request, false)?)
            .await
            .map_err(map_openai_error)?;

        let (content, stop_reason) = match response.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice
                    .finish_reason
                    .as_ref()
                    .map_or(StopReason::EndTurn, map_finish_reason),
            ),
            None => (String::new(), StopReason::EndTurn),
        };

        Ok(CompletionResponse {
            content,
            model: response.model,
            stop_reason,
            usage: response.usage.map_or_else(Usage::default, |u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    fn stream(&self, request: CompletionRequest) -> ProviderStream {
        let oai_request = match self.build_request(&request, true) {
            Ok(req) => req,
            Err(e) => return Box::pin(stream::once(async move { Err(e) })),
        };

        let client = self.client.clone();
        let opened = async move { client.chat().create_stream(oai_request).await };

        Box::pin(
            stream::once(opened)
                .map(|opened| -> ProviderStream {
                    match opened {
                        Ok(chunks) => map_openai_stream(chunks),
                        Err(e) => Box::pin(stream::once(async move { Err(map_openai_error(e)) })),
                    }
                })
                .flatten(),
        )
    }
}

fn map_openai_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            let message = api.message.as_str();

            match (code, kind) {
                ("invalid_api_key", _) | (_, "authentication_error") => {
                    LlmError::AuthenticationFailed
                }
                _ if message.contains("Incorrect API key") => LlmError::AuthenticationFailed,
                ("rate_limit_exceeded", _) | (_, "rate_limit_error") => LlmError::RateLimited,
                ("context_length_exceeded", _) => LlmError::ContextLengthExceeded,
                _ if message.contains("maximum context length") => {
                    LlmError::ContextLengthExceeded
                }
                ("server_error", _) | (_, "overloaded_error") => {
                    LlmError::Overloaded(message.to_string())
                }
                _ => LlmError::Provider {
                    message: err.to_string(),
                },
            }
        }
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited,
            Some(503 | 529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, body) => LlmError::Deserialization(body.clone()),
        OpenAIError::StreamError(e) => LlmError::Stream(e.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
