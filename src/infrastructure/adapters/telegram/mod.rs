//! Telegram adapter

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::errors::BotError;
use crate::application::messaging::parser::parse_command;
use crate::domain::entities::{Event, IncomingUpdate, Sender};
use crate::domain::traits::{Bot, BotCommand, BotInfo, KeyboardButton, ParseMode, ReplyMarkup};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl From<User> for Sender {
    fn from(user: User) -> Self {
        Sender {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            language_code: user.language_code,
        }
    }
}

impl Update {
    /// Convert into a platform-independent update.
    /// Edited messages and updates without a chat or sender are dropped.
    pub fn into_incoming(self) -> Option<IncomingUpdate> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(IncomingUpdate {
                chat_id: message.chat.id,
                sender: query.from.into(),
                date: Utc::now(),
                event: Event::Callback {
                    id: query.id,
                    message_id: Some(message.message_id),
                    data: query.data.unwrap_or_default(),
                },
            });
        }

        let message = self.message?;
        let sender: Sender = message.from?.into();
        let date = Utc.timestamp_opt(message.date, 0).single().unwrap_or_else(Utc::now);
        let message_id = message.message_id;

        let event = if let Some(contact) = message.contact {
            Event::Contact { message_id, phone_number: contact.phone_number }
        } else {
            let text = message.text?;
            match parse_command(&text) {
                Some(name) => Event::Command { message_id, name },
                None => Event::Text { message_id, text },
            }
        };

        Some(IncomingUpdate { chat_id: message.chat.id, sender, date, event })
    }
}

#[derive(Serialize)]
struct InlineKeyboardButton {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Serialize)]
struct ContactButton {
    text: String,
    request_contact: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireMarkup {
    Inline { inline_keyboard: Vec<Vec<InlineKeyboardButton>> },
    Reply { keyboard: Vec<Vec<ContactButton>>, one_time_keyboard: bool, resize_keyboard: bool },
    Remove { remove_keyboard: bool },
}

fn inline_keyboard(buttons: Vec<Vec<KeyboardButton>>) -> Vec<Vec<InlineKeyboardButton>> {
    buttons
        .into_iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.into_iter()
                .map(|btn| InlineKeyboardButton {
                    text: btn.text,
                    callback_data: btn.callback_data,
                    url: btn.url,
                })
                .collect()
        })
        .collect()
}

impl From<ReplyMarkup> for WireMarkup {
    fn from(markup: ReplyMarkup) -> Self {
        match markup {
            ReplyMarkup::Inline(buttons) => WireMarkup::Inline { inline_keyboard: inline_keyboard(buttons) },
            ReplyMarkup::RequestContact(text) => WireMarkup::Reply {
                keyboard: vec![vec![ContactButton { text, request_contact: true }]],
                one_time_keyboard: true,
                resize_keyboard: true,
            },
            ReplyMarkup::RemoveKeyboard => WireMarkup::Remove { remove_keyboard: true },
        }
    }
}

/// Telegram bot adapter
pub struct TelegramAdapter {
    token: String,
    api_base: String,
    client: Client,
    info: BotInfo,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: API_BASE.to_string(),
            client: Client::new(),
            info: BotInfo {
                id: "unknown".to_string(),
                name: "registration-bot".to_string(),
                username: "registration_bot".to_string(),
            },
        }
    }

    /// Point the adapter at another Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// POST a request and decode its `result`
    async fn call<Req, Res>(&self, method: &str, request: &Req) -> Result<Res, BotError>
    where
        Req: Serialize + ?Sized + Sync,
        Res: DeserializeOwned + Send,
    {
        #[derive(Deserialize)]
        struct Response<T> {
            result: T,
        }

        let response = self.client
            .post(self.api_url(method))
            .json(request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} failed: {}", method, body);
            return Err(BotError::Network(format!("Telegram API error: {}", status)));
        }

        let data: Response<Res> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        Ok(data.result)
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        #[derive(Deserialize)]
        struct BotInfoResponse {
            id: i64,
            first_name: String,
            username: String,
        }

        let data: BotInfoResponse = self.call("getMe", &serde_json::json!({})).await?;

        self.info = BotInfo {
            id: data.id.to_string(),
            name: data.first_name,
            username: data.username,
        };

        Ok(())
    }

    /// Get updates from Telegram using getUpdates API
    pub async fn get_updates(&self, offset: i64, timeout: i64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: i64,
            allowed_updates: Vec<String>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
        };

        self.call("getUpdates", &request).await
    }

    /// Get the next update offset
    pub fn get_next_offset(updates: &[Update]) -> i64 {
        updates.iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(0)
    }

    /// Register the webhook URL, with the secret Telegram echoes back in a header
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct SetWebhookRequest<'a> {
            url: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            secret_token: Option<&'a str>,
            allowed_updates: [&'a str; 2],
        }

        let request = SetWebhookRequest {
            url,
            secret_token,
            allowed_updates: ["message", "callback_query"],
        };

        let _: bool = self.call("setWebhook", &request).await?;
        tracing::info!("Webhook set to {}", url);
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), BotError> {
        let _: bool = self.call("deleteWebhook", &serde_json::json!({})).await?;
        tracing::info!("Webhook deleted");
        Ok(())
    }
}

#[async_trait]
impl Bot for TelegramAdapter {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
        parse_mode: Option<ParseMode>,
    ) -> Result<i64, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: i64,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            parse_mode: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_markup: Option<WireMarkup>,
        }

        #[derive(Deserialize)]
        struct MessageResult {
            message_id: i64,
        }

        tracing::debug!("Sending to {}: {}", chat_id, text);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: parse_mode.map(|m| m.as_str()),
            reply_markup: markup.map(WireMarkup::from),
        };

        let result: MessageResult = self.call("sendMessage", &request).await?;
        Ok(result.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<Vec<Vec<KeyboardButton>>>,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct EditMessageRequest<'a> {
            chat_id: i64,
            message_id: i64,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            parse_mode: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_markup: Option<WireMarkup>,
        }

        let request = EditMessageRequest {
            chat_id,
            message_id,
            text,
            parse_mode: parse_mode.map(|m| m.as_str()),
            reply_markup: keyboard.map(|k| WireMarkup::Inline { inline_keyboard: inline_keyboard(k) }),
        };

        let _: serde_json::Value = self.call("editMessageText", &request).await?;
        Ok(())
    }

    async fn remove_inline_keyboard(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        let request = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": { "inline_keyboard": [] },
        });
        let _: serde_json::Value = self.call("editMessageReplyMarkup", &request).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        let request = serde_json::json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &request).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct AnswerRequest<'a> {
            callback_query_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
            show_alert: bool,
        }

        let request = AnswerRequest { callback_query_id: callback_id, text, show_alert };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    async fn set_commands(&self, commands: &[BotCommand], language_code: &str) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Command<'a> {
            command: &'a str,
            description: &'a str,
        }

        #[derive(Serialize)]
        struct SetMyCommandsRequest<'a> {
            commands: Vec<Command<'a>>,
            scope: serde_json::Value,
            language_code: &'a str,
        }

        let request = SetMyCommandsRequest {
            commands: commands
                .iter()
                .map(|c| Command { command: &c.command, description: &c.description })
                .collect(),
            scope: serde_json::json!({ "type": "all_private_chats" }),
            language_code,
        };

        let _: bool = self.call("setMyCommands", &request).await?;
        tracing::info!("Registered bot commands for language {}", language_code);
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
