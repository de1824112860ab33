//! Logging with optional notification of the admin group

use std::sync::Arc;

use crate::domain::entities::IncomingUpdate;
use crate::domain::traits::{Bot, ParseMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Writes log lines and mirrors the important ones to the admin group
#[derive(Clone)]
pub struct Notifier {
    bot: Arc<dyn Bot>,
    admin_chat_id: i64,
}

impl Notifier {
    pub fn new(bot: Arc<dyn Bot>, admin_chat_id: i64) -> Self {
        Self { bot, admin_chat_id }
    }

    pub fn admin_chat_id(&self) -> i64 {
        self.admin_chat_id
    }

    /// Prefix identifying the user an update came from
    pub fn update_prefix(update: &IncomingUpdate) -> String {
        let username = update
            .sender
            .username
            .as_ref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| "no username".to_string());
        format!("Chat {}, user {} ({}): ", update.chat_id, update.sender.full_name(), username)
    }

    pub async fn logs(
        &self,
        severity: Severity,
        text: &str,
        update: Option<&IncomingUpdate>,
        notify_admins: bool,
        parse_mode: Option<ParseMode>,
    ) {
        let text = match update {
            Some(update) => format!("{}{}", Self::update_prefix(update), text),
            None => text.to_string(),
        };

        match severity {
            Severity::Debug => tracing::debug!("{}", text),
            Severity::Info => tracing::info!("{}", text),
            Severity::Warning => tracing::warn!("{}", text),
            Severity::Error => tracing::error!("{}", text),
            Severity::Critical => tracing::error!("CRITICAL: {}", text),
        }

        if notify_admins {
            self.notify_admins(&text, parse_mode).await;
        }
    }

    /// Send text to the admin group; delivery failures are only logged
    pub async fn notify_admins(&self, text: &str, parse_mode: Option<ParseMode>) {
        if let Err(e) = self.bot.send_message(self.admin_chat_id, text, None, parse_mode).await {
            tracing::error!("Failed to notify admins: {}", e);
        }
    }

    pub async fn info(&self, text: &str, update: Option<&IncomingUpdate>, notify_admins: bool) {
        self.logs(Severity::Info, text, update, notify_admins, None).await
    }

    pub async fn warning(&self, text: &str, update: Option<&IncomingUpdate>, notify_admins: bool) {
        self.logs(Severity::Warning, text, update, notify_admins, None).await
    }

    pub async fn error(&self, text: &str, update: Option<&IncomingUpdate>, notify_admins: bool) {
        self.logs(Severity::Error, text, update, notify_admins, None).await
    }

    pub async fn critical(&self, text: &str, update: Option<&IncomingUpdate>) {
        self.logs(Severity::Critical, text, update, true, None).await
    }
}

/// Escape text for Telegram HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Event, Sender};
    use chrono::Utc;

    #[test]
    fn prefix_names_the_user() {
        let update = IncomingUpdate {
            chat_id: 5,
            sender: Sender {
                id: 5,
                first_name: "Ivan".into(),
                last_name: Some("Petrenko".into()),
                username: Some("ivanp".into()),
                language_code: None,
            },
            date: Utc::now(),
            event: Event::Text { message_id: 1, text: "hi".into() },
        };
        assert_eq!(Notifier::update_prefix(&update), "Chat 5, user Ivan Petrenko (@ivanp): ");
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
