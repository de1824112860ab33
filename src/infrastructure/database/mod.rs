//! SQLite session persistence, so a restart does not lose conversations in progress

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::Session;
use crate::domain::traits::SessionStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self { conn: Mutex::new(conn) };
        store.init_tables()?;
        Ok(store)
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        self.connection()?.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                chat_id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64, StorageError> {
        let count = self
            .connection()?
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load_session(&self, chat_id: i64) -> Result<Option<Session>, StorageError> {
        let data: Option<String> = self
            .connection()?
            .query_row("SELECT data FROM sessions WHERE chat_id = ?1", params![chat_id], |row| {
                row.get(0)
            })
            .optional()?;

        match data {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save_session(&self, chat_id: i64, session: &Session) -> Result<(), StorageError> {
        let json = serde_json::to_string(session).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.connection()?.execute(
            "INSERT INTO sessions (chat_id, data) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
            params![chat_id, json],
        )?;
        Ok(())
    }
}
