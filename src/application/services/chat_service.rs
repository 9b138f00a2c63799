//! Chat Service
//!
//! Chat creation is asynchronous: the number is allocated and the creation
//! is queued, the row is written later by the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::application::pipeline::{SequenceAllocator, TaskQueue};
use crate::domain::{
    ApplicationRepository, Chat, ChatCreation, ChatRepository, SequenceScope, Task,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Allocate the next chat number of the application and queue its creation.
    ///
    /// Returns the allocated number before the chat row exists.
    async fn create_chat(&self, token: &str) -> Result<i64, ChatError>;

    /// Persisted chats of the application, ordered by number
    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ChatError>;
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Application not found")]
    ApplicationNotFound,

    #[error("Could not allocate chat number: {0}")]
    Allocation(#[source] AppError),

    #[error("Could not queue chat creation: {0}")]
    Enqueue(#[source] AppError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::ApplicationNotFound => AppError::NotFound("Application not found".into()),
            ChatError::Allocation(e) | ChatError::Enqueue(e) | ChatError::Store(e) => e,
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl {
    applications: Arc<dyn ApplicationRepository>,
    chats: Arc<dyn ChatRepository>,
    sequences: Arc<dyn SequenceAllocator>,
    queue: Arc<dyn TaskQueue>,
}

impl ChatServiceImpl {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        chats: Arc<dyn ChatRepository>,
        sequences: Arc<dyn SequenceAllocator>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            applications,
            chats,
            sequences,
            queue,
        }
    }

    async fn application_id(&self, token: &str) -> Result<i64, ChatError> {
        self.applications
            .find_by_token(token)
            .await?
            .map(|app| app.id)
            .ok_or(ChatError::ApplicationNotFound)
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    #[instrument(skip(self, token))]
    async fn create_chat(&self, token: &str) -> Result<i64, ChatError> {
        let application_id = self.application_id(token).await?;

        let chat_number = self
            .sequences
            .next(SequenceScope::Application(application_id))
            .await
            .map_err(ChatError::Allocation)?;

        let task = Task::ChatCreation(ChatCreation {
            application_id,
            chat_number,
        });
        if let Err(e) = self.queue.enqueue(&task).await {
            warn!(application_id, chat_number, "Chat number orphaned, creation not queued");
            return Err(ChatError::Enqueue(e));
        }
        metrics::record_enqueued(task.kind().as_str());

        info!(application_id, chat_number, "Chat creation queued");
        Ok(chat_number)
    }

    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ChatError> {
        let application_id = self.application_id(token).await?;
        Ok(self.chats.list_by_application(application_id).await?)
    }
}
