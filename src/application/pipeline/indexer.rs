//! Search indexing contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Message;
use crate::shared::error::AppError;

/// Search projection of a persisted message.
///
/// Index mapping: `chat_id` keyword, `message_number` integer, `body`
/// analyzed text, `created_at` date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDocument {
    pub chat_id: String,
    pub message_number: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageDocument {
    fn from(message: &Message) -> Self {
        Self {
            chat_id: message.chat_id.to_string(),
            message_number: message.message_number,
            body: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

/// Full-text index over persisted messages.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Create the message index if it does not exist yet.
    async fn ensure_index(&self) -> Result<(), AppError>;

    /// Write the message's document under `{chat_id}-{message_number}`.
    ///
    /// The document is searchable as soon as this returns.
    async fn index(&self, message: &Message) -> Result<(), AppError>;

    /// Fuzzy full-text match on `body`, restricted to one chat.
    async fn search(&self, chat_id: i64, query: &str) -> Result<Vec<MessageDocument>, AppError>;

    /// Cheap reachability check for readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}
