//! Telegram bot registering students and volunteer teachers for language classes

pub mod application;
pub mod domain;
pub mod infrastructure;
