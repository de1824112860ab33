//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub webhook: WebhookConfig,
    pub backend: BackendConfig,
    pub smalltalk: SmallTalkConfig,
    pub chatwoot: ChatwootConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub token: Option<String>,
    /// Group where admins receive notifications
    pub admin_chat_id: i64,
    pub owner_username: Option<String>,
    pub tech_support_username: Option<String>,
    pub speaking_club_coordinator_username: Option<String>,
    /// Phrase table; the bundled one is used when unset
    pub phrases_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookConfig {
    pub url_prefix: Option<String>,
    pub telegram_path: String,
    pub chatwoot_path: String,
    pub secret_token: Option<String>,
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackendConfig {
    pub url_prefix: String,
    pub max_attempts: u32,
    pub retry_base_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SmallTalkConfig {
    pub url_prefix: String,
    pub token: Option<String>,
    pub test_id: Option<String>,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChatwootConfig {
    pub enabled: bool,
    pub url_prefix: Option<String>,
    pub api_token: Option<String>,
    pub inbox_id: Option<i64>,
    /// Contact attribute that holds the Telegram chat id
    pub chat_id_attribute: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PersistenceConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: None,
                admin_chat_id: 0,
                owner_username: None,
                tech_support_username: None,
                speaking_club_coordinator_username: None,
                phrases_path: None,
            },
            webhook: WebhookConfig {
                url_prefix: None,
                telegram_path: "telegram".to_string(),
                chatwoot_path: "chatwoot".to_string(),
                secret_token: None,
                listen_addr: "127.0.0.1:5000".to_string(),
            },
            backend: BackendConfig {
                url_prefix: "https://admin.samanthasgroup.com/api".to_string(),
                max_attempts: 10,
                retry_base_delay_secs: 5,
            },
            smalltalk: SmallTalkConfig {
                url_prefix: "https://app.smalltalk2.me/api/integration".to_string(),
                token: None,
                test_id: None,
                poll_interval_secs: 60,
                max_poll_attempts: 10,
            },
            chatwoot: ChatwootConfig {
                enabled: false,
                url_prefix: None,
                api_token: None,
                inbox_id: None,
                chat_id_attribute: "bot_chat_id".to_string(),
            },
            persistence: PersistenceConfig {
                database_path: PathBuf::from("registration_bot.db"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name.to_string())),
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Defaults overridden by the process environment
    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("BOT_TOKEN") {
            self.bot.token = Some(token);
        }
        if let Some(id) = var("ADMIN_CHAT_ID") {
            self.bot.admin_chat_id = parse_var("ADMIN_CHAT_ID", &id)?;
        }
        if let Some(name) = var("BOT_OWNER_USERNAME") {
            self.bot.owner_username = Some(name);
        }
        if let Some(name) = var("BOT_TECH_SUPPORT_USERNAME") {
            self.bot.tech_support_username = Some(name);
        }
        if let Some(name) = var("SPEAKING_CLUB_COORDINATOR_USERNAME") {
            self.bot.speaking_club_coordinator_username = Some(name);
        }
        if let Some(level) = var("LOGGING_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        if let Some(prefix) = var("WEBHOOK_URL_PREFIX") {
            self.webhook.url_prefix = Some(prefix);
        }
        if let Some(path) = var("WEBHOOK_PATH_FOR_TELEGRAM") {
            self.webhook.telegram_path = path.trim_matches('/').to_string();
        }
        if let Some(path) = var("WEBHOOK_PATH_FOR_CHATWOOT") {
            self.webhook.chatwoot_path = path.trim_matches('/').to_string();
        }
        if let Some(secret) = var("TELEGRAM_WEBHOOK_SECRET_TOKEN") {
            self.webhook.secret_token = Some(secret);
        }

        if let Some(prefix) = var("BACKEND_URL_PREFIX") {
            self.backend.url_prefix = prefix;
        }

        if let Some(token) = var("SMALLTALK_TOKEN") {
            self.smalltalk.token = Some(token);
        }
        if let Some(test_id) = var("SMALLTALK_TEST_ID") {
            self.smalltalk.test_id = Some(test_id);
        }

        if let Some(disabled) = var("CHATWOOT_DISABLED") {
            self.chatwoot.enabled = !parse_bool("CHATWOOT_DISABLED", &disabled)?;
        }
        if let Some(prefix) = var("CHATWOOT_URL_PREFIX") {
            self.chatwoot.url_prefix = Some(prefix);
        }
        if let Some(token) = var("CHATWOOT_API_TOKEN") {
            self.chatwoot.api_token = Some(token);
        }
        if let Some(inbox) = var("CHATWOOT_INBOX_ID") {
            self.chatwoot.inbox_id = Some(parse_var("CHATWOOT_INBOX_ID", &inbox)?);
        }

        if let Some(path) = var("DATABASE_PATH") {
            self.persistence.database_path = PathBuf::from(path);
        }

        Ok(())
    }

    /// Check the settings every run mode needs
    pub fn validate(&self, webhook_mode: bool) -> Result<(), ConfigError> {
        if self.bot.token.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("bot.token (BOT_TOKEN)".to_string()));
        }
        if self.bot.admin_chat_id == 0 {
            return Err(ConfigError::MissingField("bot.admin-chat-id (ADMIN_CHAT_ID)".to_string()));
        }
        if webhook_mode && self.webhook.url_prefix.is_none() {
            return Err(ConfigError::MissingField("webhook.url-prefix (WEBHOOK_URL_PREFIX)".to_string()));
        }
        if self.chatwoot.enabled && (self.chatwoot.url_prefix.is_none() || self.chatwoot.inbox_id.is_none()) {
            return Err(ConfigError::MissingField("chatwoot.url-prefix and chatwoot.inbox-id".to_string()));
        }
        Ok(())
    }

    /// Full URL Telegram should post updates to
    pub fn telegram_webhook_url(&self) -> Option<String> {
        self.webhook.url_prefix.as_ref().map(|prefix| {
            format!("{}/{}", prefix.trim_end_matches('/'), self.webhook.telegram_path)
        })
    }
}
