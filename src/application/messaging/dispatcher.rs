//! Message dispatcher - routes inbound updates to the conversation or the helpdesk forwarder

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::application::conversation::Conversation;
use crate::application::errors::BotError;
use crate::application::services::notifier::escape_html;
use crate::application::services::{MessageForwarder, Notifier};
use crate::domain::entities::{HelpdeskUpdate, IncomingUpdate};
use crate::domain::traits::{ParseMode, SessionStore};

/// Anything the bot receives from outside
#[derive(Debug, Clone)]
pub enum Inbound {
    Telegram(IncomingUpdate),
    Helpdesk(HelpdeskUpdate),
}

impl Inbound {
    /// Telegram chat the update belongs to, if known
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Inbound::Telegram(update) => Some(update.chat_id),
            Inbound::Helpdesk(update) => update.chat_id,
        }
    }
}

/// Chats are handled in parallel. Each chat has one worker that takes its updates in arrival order
/// and goes away once its queue is empty.
pub struct MessageDispatcher {
    conversation: Arc<Conversation>,
    forwarder: Arc<MessageForwarder>,
    store: Arc<dyn SessionStore>,
    notifier: Notifier,
    owner_username: Option<String>,
    chat_queues: Mutex<HashMap<i64, mpsc::UnboundedSender<Inbound>>>,
}

impl MessageDispatcher {
    pub fn new(
        conversation: Arc<Conversation>,
        forwarder: Arc<MessageForwarder>,
        store: Arc<dyn SessionStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            conversation,
            forwarder,
            store,
            notifier,
            owner_username: None,
            chat_queues: Mutex::new(HashMap::new()),
        }
    }

    /// Username mentioned in error reports
    pub fn with_owner(mut self, username: Option<String>) -> Self {
        self.owner_username = username.filter(|u| !u.is_empty());
        self
    }

    /// Consume the channel until every sender is gone
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<Inbound>) {
        tracing::info!("Dispatcher started");
        while let Some(inbound) = receiver.recv().await {
            match inbound.chat_id() {
                Some(chat_id) => Arc::clone(&self).enqueue(chat_id, inbound).await,
                None => {
                    let dispatcher = Arc::clone(&self);
                    tokio::spawn(async move {
                        dispatcher.dispatch(inbound).await;
                    });
                }
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    /// Number of chats with a running worker
    pub async fn active_chats(&self) -> usize {
        self.chat_queues.lock().await.len()
    }

    /// Hand the update to the chat's worker, starting one if the chat has none
    async fn enqueue(self: Arc<Self>, chat_id: i64, inbound: Inbound) {
        let mut queues = self.chat_queues.lock().await;
        let inbound = match queues.get(&chat_id) {
            Some(queue) => match queue.send(inbound) {
                Ok(()) => return,
                Err(mpsc::error::SendError(inbound)) => inbound,
            },
            None => inbound,
        };

        let (queue, pending) = mpsc::unbounded_channel();
        if queue.send(inbound).is_err() {
            return;
        }
        queues.insert(chat_id, queue);
        drop(queues);

        tokio::spawn(self.drain_chat(chat_id, pending));
    }

    /// Handle the chat's updates one by one. The queue is removed under the same lock `enqueue`
    /// sends with, so nothing is left behind when the worker stops.
    async fn drain_chat(self: Arc<Self>, chat_id: i64, mut pending: mpsc::UnboundedReceiver<Inbound>) {
        loop {
            let next = {
                let mut queues = self.chat_queues.lock().await;
                match pending.try_recv() {
                    Ok(inbound) => inbound,
                    Err(_) => {
                        queues.remove(&chat_id);
                        return;
                    }
                }
            };
            self.dispatch(next).await;
        }
    }

    /// Handle one update right away. Updates of the same chat must not be dispatched concurrently;
    /// `run` takes care of that.
    pub async fn dispatch(&self, inbound: Inbound) {
        match inbound {
            Inbound::Telegram(update) => {
                if let Err(e) = self.handle_update(&update).await {
                    self.report_error(&e, &update).await;
                }
            }
            Inbound::Helpdesk(update) => {
                if let Err(e) = self.forwarder.from_helpdesk_to_user(&update).await {
                    self.notifier
                        .error(&format!("Failed to forward helpdesk message: {}", e), None, true)
                        .await;
                }
            }
        }
    }

    /// Load the session, run the conversation and save the session if nothing failed
    pub async fn handle_update(&self, update: &IncomingUpdate) -> Result<(), BotError> {
        tracing::debug!("Chat {}: {}", update.chat_id, update.describe());
        let mut session = self.store.load_session(update.chat_id).await?.unwrap_or_default();
        self.conversation.handle(&mut session, update).await?;
        self.store.save_session(update.chat_id, &session).await?;
        Ok(())
    }

    async fn report_error(&self, error: &BotError, update: &IncomingUpdate) {
        let owner = self
            .owner_username
            .as_ref()
            .map(|u| format!("\n\n@{}", u))
            .unwrap_or_default();
        let text = format!(
            "<b>Error while handling an update</b>\n\n{}<pre>{}</pre>\n\n{}{}",
            escape_html(&Notifier::update_prefix(update)),
            escape_html(&error.to_string()),
            escape_html(&update.describe()),
            owner
        );
        tracing::error!("Chat {}: {}", update.chat_id, error);
        self.notifier.notify_admins(&text, Some(ParseMode::Html)).await;
    }
}
