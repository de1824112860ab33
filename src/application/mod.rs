//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Conversation: the registration dialogue
//! - Services: notifications, validation, reference data, helpdesk forwarding
//! - Messaging: command parsing and update dispatching
//! - Errors: Domain-specific errors

pub mod conversation;
pub mod errors;
pub mod messaging;
pub mod services;
