//! Message forwarding between users and the helpdesk

use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::{ConversationMode, HelpdeskDirection, HelpdeskUpdate, Session};
use crate::domain::traits::{Bot, Helpdesk, RegistrationBackend, SessionStore};

pub struct MessageForwarder {
    bot: Arc<dyn Bot>,
    helpdesk: Arc<dyn Helpdesk>,
    backend: Arc<dyn RegistrationBackend>,
    store: Arc<dyn SessionStore>,
}

impl MessageForwarder {
    pub fn new(
        bot: Arc<dyn Bot>,
        helpdesk: Arc<dyn Helpdesk>,
        backend: Arc<dyn RegistrationBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self { bot, helpdesk, backend, store }
    }

    pub fn helpdesk_enabled(&self) -> bool {
        self.helpdesk.is_enabled()
    }

    /// Deliver an operator's message to the user and switch the chat to helpdesk mode
    pub async fn from_helpdesk_to_user(&self, update: &HelpdeskUpdate) -> Result<(), BotError> {
        if update.event != HelpdeskUpdate::MESSAGE_CREATED
            || update.direction != Some(HelpdeskDirection::Outgoing)
        {
            tracing::debug!("Ignoring helpdesk event {}", update.event);
            return Ok(());
        }

        let (chat_id, content) = match (update.chat_id, update.content.as_deref()) {
            (Some(chat_id), Some(content)) if !content.trim().is_empty() => (chat_id, content),
            _ => {
                tracing::warn!("Helpdesk message without chat id or content: {:?}", update);
                return Ok(());
            }
        };

        self.bot.send_message(chat_id, content, None, None).await?;

        let mut session = self.store.load_session(chat_id).await?.unwrap_or_default();
        session.chat_data.mode = ConversationMode::ChatWithHelpdesk;
        if let Some(conversation_id) = update.conversation_id {
            session.chat_data.helpdesk_conversation_id = Some(conversation_id);
        }
        self.store.save_session(chat_id, &session).await?;

        tracing::info!("Forwarded helpdesk message to chat {}", chat_id);
        Ok(())
    }

    /// Send a user's message to their helpdesk conversation, creating it if needed
    pub async fn from_user_to_helpdesk(&self, session: &mut Session, chat_id: i64, text: &str) -> Result<(), BotError> {
        if !self.helpdesk.is_enabled() {
            tracing::info!("Helpdesk disabled, not forwarding message from chat {}", chat_id);
            return Ok(());
        }

        let conversation_id = match session.chat_data.helpdesk_conversation_id {
            Some(id) => id,
            None => {
                let id = match self.backend.get_helpdesk_conversation_id(chat_id).await? {
                    Some(id) => id,
                    None => self.helpdesk.start_conversation(chat_id, &session.user_data).await?,
                };
                session.chat_data.helpdesk_conversation_id = Some(id);
                id
            }
        };

        self.helpdesk.send_message(conversation_id, text).await?;
        tracing::debug!("Forwarded message from chat {} to conversation {}", chat_id, conversation_id);
        Ok(())
    }
}
