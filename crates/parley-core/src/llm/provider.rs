//! The completion provider port.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

/// Boxed event stream returned by [`LlmProvider::stream`].
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// A backend that turns a message transcript into an assistant reply.
///
/// A successful stream yields any number of `TextDelta` events and ends with
/// exactly one `Done`. A stream that ends without `Done` was cut short.
pub trait LlmProvider: Send + Sync {
    /// Provider name used in logs, e.g. "openai".
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// The stream owns its request so it can outlive the caller's borrow.
    fn stream(&self, request: CompletionRequest) -> ProviderStream;
}
