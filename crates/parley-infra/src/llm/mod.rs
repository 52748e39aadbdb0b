//! LLM provider implementations.
//!
//! Contains the concrete implementation of the [`LlmProvider`] trait defined
//! in `parley-core`, plus a factory ([`create_provider`]) that builds it from
//! configuration.
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::provider::LlmProvider;
use parley_types::config::ProviderConfig;

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] from configuration.
///
/// Returns `None` when no API key is available; chat turns then fail with
/// a misconfiguration error instead of calling out.
pub fn create_provider(
    config: &ProviderConfig,
    api_key: Option<SecretString>,
) -> Option<BoxLlmProvider> {
    let api_key = api_key?;
    let provider = OpenAiCompatibleProvider::new(openai_compat::config::openai_defaults(
        api_key,
        &config.model,
        config.base_url.as_deref(),
    ));
    tracing::info!(
        provider = provider.name(),
        model = %config.model,
        "completion provider configured"
    );
    Some(BoxLlmProvider::new(provider))
}
