//! Application state wiring all services together.
//!
//! Services are generic over repository/hasher traits; AppState pins them to
//! the concrete infra implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;

use parley_core::auth::session::SessionManager;
use parley_core::chat::service::ChatService;
use parley_core::identity::service::IdentityService;
use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::ratelimit::RateLimiter;
use parley_infra::config::{load_secrets, load_server_config, Secrets};
use parley_infra::crypto::password::Argon2CredentialHasher;
use parley_infra::llm::create_provider;
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::identity::SqliteIdentityRepository;
use parley_infra::sqlite::pool::DatabasePool;
use parley_types::config::ServerConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteIdentityService =
    IdentityService<SqliteIdentityRepository, Argon2CredentialHasher>;

pub type ConcreteChatService = ChatService<SqliteChatRepository>;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<ConcreteIdentityService>,
    pub chat_service: Arc<ConcreteChatService>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init(data_dir: &Path) -> anyhow::Result<Self> {
        let config = load_server_config(data_dir).await;
        let mut secrets = load_secrets(config.production, |key| std::env::var(key).ok())?;

        let db_pool = DatabasePool::open(data_dir).await?;
        tracing::info!(path = %data_dir.display(), "database ready");

        let provider = create_provider(&config.provider, secrets.openai_api_key.take());
        Self::build(db_pool, config, &secrets, provider)
    }

    /// Wire services from already-resolved parts.
    pub fn build(
        db_pool: DatabasePool,
        config: ServerConfig,
        secrets: &Secrets,
        provider: Option<BoxLlmProvider>,
    ) -> anyhow::Result<Self> {
        let identity_service = IdentityService::new(
            SqliteIdentityRepository::new(db_pool.clone()),
            Argon2CredentialHasher::new()?,
        )?;

        let chat_service = ChatService::new(
            SqliteChatRepository::new(db_pool),
            provider,
            config.chat.clone(),
            config.provider.clone(),
        );

        let sessions = SessionManager::new(
            secrets.jwt_secret.expose_secret().as_bytes(),
            Duration::from_secs(config.session.ttl_secs),
        );

        let rate_limiter = RateLimiter::new(
            config.rate_limit.limit,
            Duration::from_millis(config.rate_limit.window_ms),
            Duration::from_secs(config.rate_limit.stale_after_secs),
        );

        Ok(Self {
            identity_service: Arc::new(identity_service),
            chat_service: Arc::new(chat_service),
            sessions: Arc::new(sessions),
            rate_limiter,
            config: Arc::new(config),
        })
    }
}
