//! Counter Repository Implementation
//!
//! Bulk UPDATE-from-subquery recomputation of `applications.chats_count` and
//! `chats.messages_count`. Rows already holding the right value are skipped,
//! so the affected row count is the number of drifted counters.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{CounterRepository, SequenceFloor, SequenceScope};
use crate::shared::error::AppError;

pub struct PgCounterRepository {
    pool: PgPool,
}

impl PgCounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterRepository for PgCounterRepository {
    #[instrument(skip(self))]
    async fn recompute_chats_counts(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE applications a
            SET chats_count = c.actual, updated_at = NOW()
            FROM (
                SELECT a2.id, COUNT(ch.id) AS actual
                FROM applications a2
                LEFT JOIN chats ch ON ch.application_id = a2.id
                GROUP BY a2.id
            ) c
            WHERE a.id = c.id AND a.chats_count IS DISTINCT FROM c.actual
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn recompute_messages_counts(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chats ch
            SET messages_count = m.actual, updated_at = NOW()
            FROM (
                SELECT c2.id, COUNT(msg.id) AS actual
                FROM chats c2
                LEFT JOIN messages msg ON msg.chat_id = c2.id
                GROUP BY c2.id
            ) m
            WHERE ch.id = m.id AND ch.messages_count IS DISTINCT FROM m.actual
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn sequence_floors(&self) -> Result<Vec<SequenceFloor>, AppError> {
        let chat_floors: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT application_id, MAX(chat_number)
            FROM chats
            GROUP BY application_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let message_floors: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT chat_id, MAX(message_number)
            FROM messages
            GROUP BY chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let applications = chat_floors.into_iter().map(|(id, max_number)| SequenceFloor {
            scope: SequenceScope::Application(id),
            max_number,
        });
        let chats = message_floors.into_iter().map(|(id, max_number)| SequenceFloor {
            scope: SequenceScope::Chat(id),
            max_number,
        });

        Ok(applications.chain(chats).collect())
    }
}
