//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Adapters: Telegram Bot API
//! - Clients: Backend, SmallTalk and Chatwoot HTTP APIs
//! - Server: Webhook endpoints
//! - Storage / Database: Session persistence

pub mod adapters;
pub mod clients;
pub mod config;
pub mod database;
pub mod server;
pub mod storage;
