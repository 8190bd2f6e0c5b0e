//! Bot configuration.
//!
//! Settings are parsed from a TOML file once at startup and are immutable for
//! the lifetime of the process. Secrets (bot token, link secret) may be
//! supplied through the environment instead of the file so that the file can
//! be committed without credentials.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse failure.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation failure.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// Telegram settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Backend API settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Redis session cache settings.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Per-user rate limits.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Default tracing filter, overridable via `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl BotConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides for secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides: `BOT_TOKEN` and `BOT_LINK_SECRET`.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(secret) = std::env::var("BOT_LINK_SECRET") {
            self.telegram.link_secret = Some(secret);
        }
    }

    /// Fail-closed validation of the loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error when a required field is missing or a numeric field
    /// is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token is required (file or BOT_TOKEN env)".to_string(),
            ));
        }
        if self.backend.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "backend.base_url is required".to_string(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_secs must be positive".to_string(),
            ));
        }
        if self.redis.session_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "redis.session_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Telegram settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Usually injected via the `BOT_TOKEN` environment
    /// variable rather than stored in the file.
    #[serde(default)]
    pub bot_token: String,

    /// Shared secret for the user account-linking endpoint
    /// (`X-Bot-Secret` header). Linking is disabled when absent.
    #[serde(default)]
    pub link_secret: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            link_secret: None,
        }
    }
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the CRM backend, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds. Requests that exceed it are treated
    /// as failed, never retried.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redis session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Session TTL in seconds. Default is 24 hours.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// Per-user fixed-window rate limits. Windows are 60 seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum login attempts per minute.
    #[serde(default = "default_login_limit")]
    pub login_per_minute: u32,

    /// Maximum general requests per minute.
    #[serde(default = "default_general_limit")]
    pub general_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: default_login_limit(),
            general_per_minute: default_general_limit(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

const fn default_session_ttl_secs() -> u64 {
    86_400
}

const fn default_login_limit() -> u32 {
    5
}

const fn default_general_limit() -> u32 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = BotConfig::from_toml("").unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.redis.session_ttl_secs, 86_400);
        assert_eq!(config.rate_limits.login_per_minute, 5);
        assert_eq!(config.rate_limits.general_per_minute, 30);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            log_filter = "debug"

            [telegram]
            bot_token = "123:abc"
            link_secret = "s3cret"

            [backend]
            base_url = "https://crm.example.org"
            timeout_secs = 10

            [redis]
            url = "redis://cache:6379/1"
            session_ttl_secs = 3600

            [rate_limits]
            login_per_minute = 3
            general_per_minute = 60
        "#;

        let config = BotConfig::from_toml(toml).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.link_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.backend.base_url, "https://crm.example.org");
        assert_eq!(config.backend.timeout(), Duration::from_secs(10));
        assert_eq!(config.redis.url, "redis://cache:6379/1");
        assert_eq!(config.redis.session_ttl_secs, 3600);
        assert_eq!(config.rate_limits.login_per_minute, 3);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn missing_bot_token_fails_validation() {
        let config = BotConfig::from_toml("").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let toml = r#"
            [telegram]
            bot_token = "123:abc"

            [backend]
            timeout_secs = 0
        "#;
        let config = BotConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let err = BotConfig::from_toml("backend = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[telegram]\nbot_token = \"42:xyz\"").unwrap();
        let config = BotConfig::from_file(file.path()).unwrap();
        // BOT_TOKEN may be set in the environment and override the file.
        assert!(!config.telegram.bot_token.is_empty());
    }
}
