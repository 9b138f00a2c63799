//! Application Repository Implementation
//!
//! PostgreSQL implementation of application operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::map_insert_error;
use crate::domain::{Application, ApplicationRepository};
use crate::shared::error::AppError;

/// PostgreSQL application repository implementation.
pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    /// Creates a new PgApplicationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for application queries.
#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    name: String,
    token: String,
    chats_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_application(self) -> Application {
        Application {
            id: self.id,
            name: self.name,
            token: self.token,
            chats_count: self.chats_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn create(&self, name: &str, token: &str) -> Result<Application, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications (name, token)
            VALUES ($1, $2)
            RETURNING id, name, token, chats_count, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Application token already in use", "unreachable"))?;

        Ok(row.into_application())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT id, name, token, chats_count, created_at, updated_at
            FROM applications
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_application()))
    }

    async fn list(&self) -> Result<Vec<Application>, AppError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT id, name, token, chats_count, created_at, updated_at
            FROM applications
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_application()).collect())
    }

    async fn update_name(&self, token: &str, name: &str) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications
            SET name = $2, updated_at = NOW()
            WHERE token = $1
            RETURNING id, name, token, chats_count, created_at, updated_at
            "#,
        )
        .bind(token)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_application()))
    }
}
