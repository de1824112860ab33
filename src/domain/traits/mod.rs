//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod services;
pub mod store;

pub use bot::{Bot, BotCommand, BotInfo, KeyboardButton, ParseMode, ReplyMarkup};
pub use services::{
    CreatedPerson, Helpdesk, OralTest, OralTestOutcome, OralTestResult, OralTestService,
    ReferenceDataSource, RegistrationBackend,
};
pub use store::SessionStore;
