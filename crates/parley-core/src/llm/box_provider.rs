//! Type-erased, cheaply cloneable handle over any [`LlmProvider`].
//!
//! `LlmProvider::complete` returns `impl Future`, so the trait cannot be a
//! trait object. [`ErasedProvider`] boxes that future and is blanket-implemented
//! for every provider; [`BoxLlmProvider`] shares one behind an `Arc` so a
//! streaming turn can move its own handle into a spawned task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::{LlmProvider, ProviderStream};

type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

trait ErasedProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
    fn stream(&self, request: CompletionRequest) -> ProviderStream;
}

impl<T: LlmProvider> ErasedProvider for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(LlmProvider::complete(self, request))
    }

    fn stream(&self, request: CompletionRequest) -> ProviderStream {
        LlmProvider::stream(self, request)
    }
}

#[derive(Clone)]
pub struct BoxLlmProvider {
    inner: Arc<dyn ErasedProvider>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete(request).await
    }

    pub fn stream(&self, request: CompletionRequest) -> ProviderStream {
        self.inner.stream(request)
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxLlmProvider").field(&self.name()).finish()
    }
}
