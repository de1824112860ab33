//! Message handling - command parsing and update dispatching

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{Inbound, MessageDispatcher};
pub use parser::parse_command;
