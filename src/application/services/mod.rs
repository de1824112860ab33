//! Application services - Business logic orchestration

pub mod bot_data_loader;
pub mod helpdesk;
pub mod notifier;
pub mod validation;

pub use bot_data_loader::BotDataLoader;
pub use helpdesk::MessageForwarder;
pub use notifier::{Notifier, Severity};
