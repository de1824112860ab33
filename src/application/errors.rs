//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors of calls to external HTTP APIs (backend, SmallTalk, Chatwoot)
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status {status} from {url}: {body}")]
    UnexpectedStatus { status: u16, url: String, body: String },

    #[error("Gave up on {url} after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Unusable response: {0}")]
    Logic(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<ConfigError> for BotError {
    fn from(e: ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_converts_into_bot_error() {
        let err: BotError = ApiError::Exhausted { url: "http://x/".into(), attempts: 10 }.into();
        assert_eq!(err.to_string(), "API error: Gave up on http://x/ after 10 attempts");
    }

    #[test]
    fn config_error_keeps_field_name() {
        let err: BotError = ConfigError::MissingField("bot.token".into()).into();
        assert!(err.to_string().contains("bot.token"));
    }
}
