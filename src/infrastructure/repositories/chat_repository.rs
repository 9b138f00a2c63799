//! Chat Repository Implementation
//!
//! PostgreSQL implementation of chat operations. Chat numbers are written
//! explicitly; the `(application_id, chat_number)` unique constraint rejects
//! replays.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::map_insert_error;
use crate::domain::{Chat, ChatRepository};
use crate::shared::error::AppError;

/// PostgreSQL chat repository implementation.
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    application_id: i64,
    chat_number: i64,
    messages_count: i64,
    created_at: DateTime<Utc>,
}

impl ChatRow {
    fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            application_id: self.application_id,
            chat_number: self.chat_number,
            messages_count: self.messages_count,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn insert(&self, application_id: i64, chat_number: i64) -> Result<Chat, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (application_id, chat_number)
            VALUES ($1, $2)
            RETURNING id, application_id, chat_number, messages_count, created_at
            "#,
        )
        .bind(application_id)
        .bind(chat_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_insert_error(
                e,
                &format!("Chat {} already exists in application {}", chat_number, application_id),
                &format!("Application {} not found", application_id),
            )
        })?;

        Ok(row.into_chat())
    }

    async fn find_by_number(
        &self,
        application_id: i64,
        chat_number: i64,
    ) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, application_id, chat_number, messages_count, created_at
            FROM chats
            WHERE application_id = $1 AND chat_number = $2
            "#,
        )
        .bind(application_id)
        .bind(chat_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_chat()))
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Chat>, AppError> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, application_id, chat_number, messages_count, created_at
            FROM chats
            WHERE application_id = $1
            ORDER BY chat_number
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_chat()).collect())
    }
}
