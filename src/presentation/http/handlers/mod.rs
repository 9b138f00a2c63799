//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod applications;
pub mod chats;
pub mod health;
pub mod messages;
