//! HTTP clients for the backend, SmallTalk and Chatwoot

pub mod backend;
pub mod base;
pub mod chatwoot;
pub mod smalltalk;

pub use backend::BackendClient;
pub use base::{ApiClient, ApiResponse, RetryPolicy};
pub use chatwoot::ChatwootClient;
pub use smalltalk::SmallTalkClient;
