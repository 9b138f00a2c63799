//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a message in a chat.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - chat_id: BIGINT NOT NULL REFERENCES chats(id) ON DELETE CASCADE
/// - message_number: BIGINT NOT NULL, UNIQUE (chat_id, message_number)
/// - body: TEXT NOT NULL
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,

    /// Owning chat (internal id, not the chat number)
    pub chat_id: i64,

    /// Allocated before persistence; unique within the chat
    pub message_number: i64,

    pub body: String,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Identifier of this message's search document.
    pub fn document_id(&self) -> String {
        format!("{}-{}", self.chat_id, self.message_number)
    }
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a message with a pre-allocated number.
    ///
    /// A second insert with the same `(chat_id, message_number)` fails with
    /// `AppError::Conflict`.
    async fn insert(
        &self,
        chat_id: i64,
        message_number: i64,
        body: &str,
    ) -> Result<Message, AppError>;

    /// Find a message by its number within a chat.
    async fn find_by_number(
        &self,
        chat_id: i64,
        message_number: i64,
    ) -> Result<Option<Message>, AppError>;

    /// List messages of a chat with keyset pagination on `message_number`.
    ///
    /// - `after`: only messages numbered strictly above this value
    /// - `limit`: maximum number of messages to return
    async fn list_by_chat(
        &self,
        chat_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;
}
