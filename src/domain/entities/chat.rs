//! Chat entity, repository trait, and aggregate counter contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::SequenceScope;
use crate::shared::error::AppError;

/// A conversation inside an application.
///
/// Maps to the `chats` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - application_id: BIGINT NOT NULL REFERENCES applications(id) ON DELETE CASCADE
/// - chat_number: BIGINT NOT NULL, UNIQUE (application_id, chat_number)
/// - messages_count: BIGINT NOT NULL DEFAULT 0 (reconciled, eventually consistent)
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub application_id: i64,
    /// Allocated before persistence; unique within the application
    pub chat_number: i64,
    pub messages_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Chat data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert a chat with a pre-allocated number.
    ///
    /// A second insert with the same `(application_id, chat_number)` fails
    /// with `AppError::Conflict`.
    async fn insert(&self, application_id: i64, chat_number: i64) -> Result<Chat, AppError>;

    /// Find a chat by its number within an application.
    async fn find_by_number(
        &self,
        application_id: i64,
        chat_number: i64,
    ) -> Result<Option<Chat>, AppError>;

    /// List the chats of an application ordered by number.
    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Chat>, AppError>;
}

/// Highest persisted sequence number for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceFloor {
    pub scope: SequenceScope,
    pub max_number: i64,
}

/// Recomputation of denormalized counters from source rows.
///
/// Implementations overwrite counters wholesale and only touch rows whose
/// stored value differs, so the returned counts are the number of rows that
/// had drifted.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Set every `applications.chats_count` to the number of its chats.
    async fn recompute_chats_counts(&self) -> Result<u64, AppError>;

    /// Set every `chats.messages_count` to the number of its messages.
    async fn recompute_messages_counts(&self) -> Result<u64, AppError>;

    /// Highest persisted number per application and per chat.
    async fn sequence_floors(&self) -> Result<Vec<SequenceFloor>, AppError>;
}
