//! In-memory session storage

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::entities::Session;
use crate::domain::traits::SessionStore;

/// Sessions kept for the lifetime of the process
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<i64, Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, chat_id: i64) -> Result<Option<Session>, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&chat_id).cloned())
    }

    async fn save_session(&self, chat_id: i64, session: &Session) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(chat_id, session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ConversationState;

    #[tokio::test]
    async fn saved_session_is_loaded_back() {
        let store = MemoryStore::new();
        assert!(store.load_session(1).await.unwrap().is_none());

        let mut session = Session::default();
        session.state = Some(ConversationState::AskRole);
        store.save_session(1, &session).await.unwrap();

        assert_eq!(store.load_session(1).await.unwrap(), Some(session));
        assert_eq!(store.len().await, 1);
    }
}
