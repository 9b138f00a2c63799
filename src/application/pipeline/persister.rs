//! Applies queued creations to the primary store.
//!
//! Numbers are written explicitly, never auto-assigned. The per-scope unique
//! constraint is the only deduplication: replaying a task fails with
//! [`ApplyError::Duplicate`] instead of being absorbed.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::{Chat, ChatRepository, Message, MessageRepository};
use crate::shared::error::AppError;

/// Failure to apply a creation, classified for the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The row already exists (redelivery or replay)
    #[error("already applied: {0}")]
    Duplicate(String),

    /// May succeed if attempted again later
    #[error("transient failure: {0}")]
    Transient(AppError),

    /// Will never succeed (e.g. the owning row is gone)
    #[error("rejected: {0}")]
    Rejected(AppError),
}

impl ApplyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApplyError::Transient(_))
    }
}

impl From<AppError> for ApplyError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Conflict(msg) => ApplyError::Duplicate(msg),
            e if e.is_transient() => ApplyError::Transient(e),
            e => ApplyError::Rejected(e),
        }
    }
}

#[derive(Clone)]
pub struct Persister {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl Persister {
    pub fn new(chats: Arc<dyn ChatRepository>, messages: Arc<dyn MessageRepository>) -> Self {
        Self { chats, messages }
    }

    #[instrument(skip(self))]
    pub async fn apply_chat_creation(
        &self,
        application_id: i64,
        chat_number: i64,
    ) -> Result<Chat, ApplyError> {
        let chat = self.chats.insert(application_id, chat_number).await?;
        debug!(chat_id = chat.id, "Chat persisted");
        Ok(chat)
    }

    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn apply_message_creation(
        &self,
        chat_id: i64,
        message_number: i64,
        body: &str,
    ) -> Result<Message, ApplyError> {
        let message = self.messages.insert(chat_id, message_number, body).await?;
        debug!(message_id = message.id, "Message persisted");
        Ok(message)
    }

    /// Load an already persisted message, used when a replay hits the
    /// unique constraint and the search document still has to be written.
    pub async fn existing_message(
        &self,
        chat_id: i64,
        message_number: i64,
    ) -> Result<Option<Message>, AppError> {
        self.messages.find_by_number(chat_id, message_number).await
    }
}
