//! Server configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` by default) and
//! deserializes it into [`ServerConfig`], then layers environment overrides on
//! top. Secrets never live in the file; [`load_secrets`] reads them from the
//! environment and wraps them in [`SecretString`].

use std::path::{Path, PathBuf};

use rand::Rng;
use secrecy::SecretString;

use parley_types::config::ServerConfig;

/// Minimum accepted length for a configured session signing secret.
const MIN_SECRET_BYTES: usize = 32;

/// Secret material resolved from the environment.
pub struct Secrets {
    pub jwt_secret: SecretString,
    pub openai_api_key: Option<SecretString>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("jwt_secret", &"[redacted]")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PARLEY_JWT_SECRET must be set in production")]
    MissingSigningSecret,

    #[error("session signing secret must be at least 32 bytes")]
    WeakSigningSecret,
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PARLEY_DATA_DIR` environment variable
/// 2. `~/.parley`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }

    PathBuf::from(".parley")
}

/// Load server configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ServerConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Environment overrides are applied in both cases.
pub async fn load_server_config(data_dir: &Path) -> ServerConfig {
    let mut config = read_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> ServerConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ServerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ServerConfig::default();
        }
    };

    match toml::from_str::<ServerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServerConfig::default()
        }
    }
}

/// Apply `OPENAI_MODEL`, `OPENAI_BASE_URL` and `PARLEY_ENV` on top of the file.
pub fn apply_env_overrides(config: &mut ServerConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(model) = env("OPENAI_MODEL").filter(|v| !v.trim().is_empty()) {
        config.provider.model = model.trim().to_string();
    }
    if let Some(base_url) = env("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()) {
        config.provider.base_url = Some(base_url.trim().to_string());
    }
    if let Some(mode) = env("PARLEY_ENV") {
        config.production = mode.eq_ignore_ascii_case("production");
    }
}

/// Read the signing secret and provider key from the environment.
///
/// Without a signing secret a random per-process one is generated, which
/// invalidates all sessions on restart. Production refuses to start instead.
pub fn load_secrets(
    production: bool,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Secrets, ConfigError> {
    let configured = env("PARLEY_JWT_SECRET")
        .or_else(|| env("JWT_SECRET"))
        .filter(|v| !v.is_empty());

    let jwt_secret = match configured {
        Some(secret) if secret.len() < MIN_SECRET_BYTES => {
            return Err(ConfigError::WeakSigningSecret);
        }
        Some(secret) => SecretString::from(secret),
        None if production => return Err(ConfigError::MissingSigningSecret),
        None => {
            tracing::warn!(
                "PARLEY_JWT_SECRET not set; using a random secret, sessions will not survive a restart"
            );
            random_secret()
        }
    };

    let openai_api_key = env("OPENAI_API_KEY")
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from);
    if openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; chat turns will fail until it is configured");
    }

    Ok(Secrets {
        jwt_secret,
        openai_api_key,
    })
}

fn random_secret() -> SecretString {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    SecretString::from(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const STRONG: &str = "0123456789abcdef0123456789abcdef";

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.rate_limit.limit, 5);
        assert_eq!(config.session.ttl_secs, 86_400);
        assert!(!config.production);
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
production = true

[rate_limit]
limit = 20

[provider]
model = "gpt-4o"
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert!(config.production);
        assert_eq!(config.rate_limit.limit, 20);
        assert_eq!(config.rate_limit.window_ms, 10_000);
        assert_eq!(config.provider.model, "gpt-4o");
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.rate_limit.limit, 5);
    }

    #[test]
    fn env_overrides_model_base_url_and_mode() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            env_of(&[
                ("OPENAI_MODEL", "gpt-4.1"),
                ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
                ("PARLEY_ENV", "production"),
            ]),
        );
        assert_eq!(config.provider.model, "gpt-4.1");
        assert_eq!(
            config.provider.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert!(config.production);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, env_of(&[("OPENAI_MODEL", "  ")]));
        assert_eq!(config.provider.model, "gpt-4o-mini");
    }

    #[test]
    fn secrets_from_env() {
        let secrets = load_secrets(
            true,
            env_of(&[("PARLEY_JWT_SECRET", STRONG), ("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();
        assert_eq!(secrets.jwt_secret.expose_secret(), STRONG);
        assert_eq!(
            secrets.openai_api_key.unwrap().expose_secret(),
            "sk-test"
        );
    }

    #[test]
    fn legacy_secret_name_is_accepted() {
        let secrets = load_secrets(false, env_of(&[("JWT_SECRET", STRONG)])).unwrap();
        assert_eq!(secrets.jwt_secret.expose_secret(), STRONG);
        assert!(secrets.openai_api_key.is_none());
    }

    #[test]
    fn missing_secret_is_fatal_in_production() {
        let err = load_secrets(true, env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSigningSecret));
    }

    #[test]
    fn missing_secret_is_random_in_development() {
        let a = load_secrets(false, env_of(&[])).unwrap();
        let b = load_secrets(false, env_of(&[])).unwrap();
        assert_eq!(a.jwt_secret.expose_secret().len(), 64);
        assert_ne!(a.jwt_secret.expose_secret(), b.jwt_secret.expose_secret());
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = load_secrets(false, env_of(&[("PARLEY_JWT_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::WeakSigningSecret));
    }

    #[test]
    fn debug_redacts_secrets() {
        let secrets = load_secrets(
            false,
            env_of(&[("PARLEY_JWT_SECRET", STRONG), ("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();
        let rendered = format!("{secrets:?}");
        assert!(!rendered.contains(STRONG));
        assert!(!rendered.contains("sk-test"));
    }
}
