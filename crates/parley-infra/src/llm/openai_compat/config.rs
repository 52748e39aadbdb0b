//! Configuration for the OpenAI-compatible provider.

use secrecy::SecretString;

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai").
    pub provider_name: String,
    /// Without a trailing slash.
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves its model empty.
    pub model: String,
}

/// Settings for OpenAI itself.
///
/// Base URL: `https://api.openai.com/v1`, or `base_url` when given (local
/// gateways and other OpenAI-compatible servers).
pub fn openai_defaults(api_key: SecretString, model: &str, base_url: Option<&str>) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: base_url.unwrap_or(OPENAI_BASE_URL).trim_end_matches('/').into(),
        api_key,
        model: model.into(),
    }
}
