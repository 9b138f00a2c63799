//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::pipeline::MessageDocument;
use crate::domain::{Application, Chat, Message};

/// Application response
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub name: String,
    pub token: String,
    pub chats_count: i64,
    pub created_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        Self {
            name: app.name,
            token: app.token,
            chats_count: app.chats_count,
            created_at: app.created_at.to_rfc3339(),
        }
    }
}

/// Returned when a chat creation is accepted
#[derive(Debug, Serialize)]
pub struct ChatCreatedResponse {
    pub chat_number: i64,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat_number: i64,
    pub messages_count: i64,
    pub created_at: String,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            chat_number: chat.chat_number,
            messages_count: chat.messages_count,
            created_at: chat.created_at.to_rfc3339(),
        }
    }
}

/// Returned when a message creation is accepted
#[derive(Debug, Serialize)]
pub struct MessageCreatedResponse {
    pub message_number: i64,
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message_number: i64,
    pub body: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            message_number: message.message_number,
            body: message.body,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

impl From<MessageDocument> for MessageResponse {
    fn from(doc: MessageDocument) -> Self {
        Self {
            message_number: doc.message_number,
            body: doc.body,
            created_at: doc.created_at.to_rfc3339(),
        }
    }
}

/// Search results
#[derive(Debug, Serialize)]
pub struct MessageSearchResponse {
    pub messages: Vec<MessageResponse>,
}
