//! Adapts `async-openai` chunk streams to [`StreamEvent`]s.

use futures_util::StreamExt;

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};

use parley_core::llm::provider::ProviderStream;
use parley_types::llm::{LlmError, StopReason, StreamEvent, Usage};

/// Forward text chunks as they arrive and close with one `Done`.
///
/// The finish reason and the usage chunk (sent last, with empty `choices`,
/// when `include_usage` is set) are held back and reported on `Done`.
/// `async-openai` ends the stream quietly when the connection closes before
/// `[DONE]`, so a stream that never carried a finish reason ends with `Err`
/// instead of `Done`, as does any transport or decode error.
pub fn map_openai_stream(mut chunks: ChatCompletionResponseStream) -> ProviderStream {
    Box::pin(async_stream::try_stream! {
        let mut stop_reason = None;
        let mut usage = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;

            if let Some(u) = &chunk.usage {
                usage = Some(Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                });
            }

            for choice in chunk.choices {
                if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta { text };
                }
                if let Some(reason) = &choice.finish_reason {
                    stop_reason = Some(map_finish_reason(reason));
                }
            }
        }

        let stop_reason = stop_reason
            .ok_or_else(|| LlmError::Stream("stream ended without finish reason".to_string()))?;
        yield StreamEvent::Done { stop_reason, usage };
    })
}

/// Tool calls are never requested, so a server reporting one still ended the turn.
pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::Stop | FinishReason::ToolCalls | FinishReason::FunctionCall => {
            StopReason::EndTurn
        }
    }
}
