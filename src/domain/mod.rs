//! Domain layer - Core business objects and abstractions
//!
//! This layer contains:
//! - Entities: user data, sessions, reference data, phrases, updates
//! - Traits: Abstractions for infrastructure (Bot, SessionStore, external services)

pub mod entities;
pub mod traits;
