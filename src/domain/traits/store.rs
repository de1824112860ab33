use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::Session;

/// Store trait - persistence of conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, chat_id: i64) -> Result<Option<Session>, StorageError>;
    async fn save_session(&self, chat_id: i64, session: &Session) -> Result<(), StorageError>;
}
