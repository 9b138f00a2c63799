//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ApplicationService**: Application CRUD and token issuance
//! - **ChatService**: Chat number allocation and queued creation
//! - **MessageService**: Message number allocation, queued creation, listing, search

pub mod application_service;
pub mod chat_service;
pub mod message_service;

pub use application_service::{generate_token, ApplicationService, ApplicationServiceImpl};

pub use chat_service::{ChatError, ChatService, ChatServiceImpl};

pub use message_service::{MessageError, MessageQueryDto, MessageService, MessageServiceImpl};
