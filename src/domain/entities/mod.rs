//! # Domain Entities
//!
//! All entities map directly to their corresponding database tables.
//!
//! - **Application**: a tenant, addressed externally by its token
//! - **Chat**: numbered per application (`chat_number`)
//! - **Message**: numbered per chat (`message_number`)
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. `CounterRepository` owns the denormalized aggregate counters
//! (`chats_count`, `messages_count`); nothing else overwrites them.

mod application;
mod chat;
mod message;

pub use application::{Application, ApplicationRepository};
pub use chat::{Chat, ChatRepository, CounterRepository, SequenceFloor};
pub use message::{Message, MessageRepository};

#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
