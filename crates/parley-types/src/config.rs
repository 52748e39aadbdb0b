//! Server configuration types for Parley.
//!
//! `ServerConfig` represents `{data_dir}/config.toml`. Every field has a
//! default, so an empty or missing file yields a working development setup.
//! Secrets (signing key, provider API key) are not part of this file; they
//! come from the environment.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Parley server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Marks secure cookies and makes a missing signing secret fatal.
    #[serde(default)]
    pub production: bool,

    /// Directory with the login page and static assets, served as a fallback.
    #[serde(default)]
    pub web_dir: Option<String>,
}

/// Session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute token lifetime in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// Fixed-window limiter on the message-send path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit")]
    pub limit: u32,

    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Entries whose window started longer ago than this are swept.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_rate_limit() -> u32 {
    5
}

fn default_rate_window_ms() -> u64 {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_stale_after_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_rate_limit(),
            window_ms: default_rate_window_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            trust_proxy: false,
        }
    }
}

/// Input limits for chat turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Length of an auto-generated conversation title in characters.
    #[serde(default = "default_title_chars")]
    pub title_chars: usize,

    /// Maximum number of entries in a caller-supplied message list.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// How long shutdown waits for streamed turns still being persisted.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_max_message_chars() -> usize {
    2_000
}

fn default_title_chars() -> usize {
    30
}

fn default_max_history() -> usize {
    200
}

fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            title_chars: default_title_chars(),
            max_history: default_max_history(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override for OpenAI-compatible endpoints; `None` uses the public API.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: None,
        }
    }
}
