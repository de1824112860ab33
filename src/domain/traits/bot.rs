use async_trait::async_trait;
use crate::application::errors::BotError;

/// Bot trait - abstraction for the messaging platform
#[async_trait]
pub trait Bot: Send + Sync {
    /// Send a message to a chat, returning the new message id
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
        parse_mode: Option<ParseMode>,
    ) -> Result<i64, BotError>;

    /// Replace the text and inline keyboard of an existing message
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<Vec<Vec<KeyboardButton>>>,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), BotError>;

    /// Drop the inline keyboard, keeping the message text
    async fn remove_inline_keyboard(&self, chat_id: i64, message_id: i64) -> Result<(), BotError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), BotError>;

    /// Answer a callback query
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> Result<(), BotError>;

    /// Set the command menu for users with the given language
    async fn set_commands(&self, commands: &[BotCommand], language_code: &str) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Keyboard button for inline keyboards
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardButton {
    pub text: String,
    pub callback_data: Option<String>,
    pub url: Option<String>,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: None,
        }
    }

    pub fn with_callback(mut self, data: impl Into<String>) -> Self {
        self.callback_data = Some(data.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Markup attached to a new message
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyMarkup {
    Inline(Vec<Vec<KeyboardButton>>),
    /// One-time reply keyboard with a single "share contact" button
    RequestContact(String),
    RemoveKeyboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
