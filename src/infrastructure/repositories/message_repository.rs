//! Message Repository Implementation
//!
//! PostgreSQL implementation of message operations with keyset pagination
//! on `message_number`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::map_insert_error;
use crate::domain::{Message, MessageRepository};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    message_number: i64,
    body: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            message_number: self.message_number,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(
        &self,
        chat_id: i64,
        message_number: i64,
        body: &str,
    ) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (chat_id, message_number, body)
            VALUES ($1, $2, $3)
            RETURNING id, chat_id, message_number, body, created_at
            "#,
        )
        .bind(chat_id)
        .bind(message_number)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_insert_error(
                e,
                &format!("Message {} already exists in chat {}", message_number, chat_id),
                &format!("Chat {} not found", chat_id),
            )
        })?;

        Ok(row.into_message())
    }

    async fn find_by_number(
        &self,
        chat_id: i64,
        message_number: i64,
    ) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, message_number, body, created_at
            FROM messages
            WHERE chat_id = $1 AND message_number = $2
            "#,
        )
        .bind(chat_id)
        .bind(message_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Messages are returned in ascending number order.
    async fn list_by_chat(
        &self,
        chat_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, message_number, body, created_at
            FROM messages
            WHERE chat_id = $1 AND message_number > $2
            ORDER BY message_number
            LIMIT $3
            "#,
        )
        .bind(chat_id)
        .bind(after.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}
