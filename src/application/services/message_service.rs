//! Message Service
//!
//! Handles message creation (queued), listing, and full-text search.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::application::pipeline::{MessageDocument, SearchIndexer, SequenceAllocator, TaskQueue};
use crate::domain::{
    ApplicationRepository, Chat, ChatRepository, Message, MessageCreation, MessageRepository,
    SequenceScope, Task,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Allocate the next message number of the chat and queue its creation.
    ///
    /// The chat must already be persisted.
    async fn create_message(
        &self,
        token: &str,
        chat_number: i64,
        body: &str,
    ) -> Result<i64, MessageError>;

    /// Persisted messages of a chat, ordered by number
    async fn list_messages(
        &self,
        token: &str,
        chat_number: i64,
        query: MessageQueryDto,
    ) -> Result<Vec<Message>, MessageError>;

    /// Fuzzy full-text search within a chat
    async fn search_messages(
        &self,
        token: &str,
        chat_number: i64,
        query: &str,
    ) -> Result<Vec<MessageDocument>, MessageError>;
}

/// Message list parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageQueryDto {
    pub after: Option<i64>,
    pub limit: Option<i64>,
}

impl MessageQueryDto {
    fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Application not found")]
    ApplicationNotFound,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Could not allocate message number: {0}")]
    Allocation(#[source] AppError),

    #[error("Could not queue message creation: {0}")]
    Enqueue(#[source] AppError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MessageError> for AppError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::ApplicationNotFound => AppError::NotFound("Application not found".into()),
            MessageError::ChatNotFound => AppError::NotFound("Chat not found".into()),
            MessageError::Allocation(e) | MessageError::Enqueue(e) | MessageError::Store(e) => e,
        }
    }
}

/// MessageService implementation
pub struct MessageServiceImpl {
    applications: Arc<dyn ApplicationRepository>,
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    sequences: Arc<dyn SequenceAllocator>,
    queue: Arc<dyn TaskQueue>,
    search: Arc<dyn SearchIndexer>,
}

impl MessageServiceImpl {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        sequences: Arc<dyn SequenceAllocator>,
        queue: Arc<dyn TaskQueue>,
        search: Arc<dyn SearchIndexer>,
    ) -> Self {
        Self {
            applications,
            chats,
            messages,
            sequences,
            queue,
            search,
        }
    }

    /// Resolve `(token, chat_number)` to a persisted chat row.
    async fn resolve_chat(&self, token: &str, chat_number: i64) -> Result<Chat, MessageError> {
        let application = self
            .applications
            .find_by_token(token)
            .await?
            .ok_or(MessageError::ApplicationNotFound)?;

        self.chats
            .find_by_number(application.id, chat_number)
            .await?
            .ok_or(MessageError::ChatNotFound)
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    #[instrument(skip(self, token, body), fields(body_len = body.len()))]
    async fn create_message(
        &self,
        token: &str,
        chat_number: i64,
        body: &str,
    ) -> Result<i64, MessageError> {
        let chat = self.resolve_chat(token, chat_number).await?;

        let message_number = self
            .sequences
            .next(SequenceScope::Chat(chat.id))
            .await
            .map_err(MessageError::Allocation)?;

        let task = Task::MessageCreation(MessageCreation {
            chat_id: chat.id,
            message_number,
            body: body.to_string(),
        });
        if let Err(e) = self.queue.enqueue(&task).await {
            warn!(chat_id = chat.id, message_number, "Message number orphaned, creation not queued");
            return Err(MessageError::Enqueue(e));
        }
        metrics::record_enqueued(task.kind().as_str());

        info!(chat_id = chat.id, message_number, "Message creation queued");
        Ok(message_number)
    }

    async fn list_messages(
        &self,
        token: &str,
        chat_number: i64,
        query: MessageQueryDto,
    ) -> Result<Vec<Message>, MessageError> {
        let chat = self.resolve_chat(token, chat_number).await?;
        Ok(self
            .messages
            .list_by_chat(chat.id, query.after, query.page_size())
            .await?)
    }

    async fn search_messages(
        &self,
        token: &str,
        chat_number: i64,
        query: &str,
    ) -> Result<Vec<MessageDocument>, MessageError> {
        let chat = self.resolve_chat(token, chat_number).await?;
        Ok(self.search.search(chat.id, query).await?)
    }
}
