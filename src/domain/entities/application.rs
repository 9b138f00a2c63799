//! Application entity and repository trait.
//!
//! Maps to the `applications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A tenant that owns chats.
///
/// Maps to the `applications` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - name: VARCHAR(255) NOT NULL
/// - token: VARCHAR(255) NOT NULL UNIQUE
/// - chats_count: BIGINT NOT NULL DEFAULT 0 (reconciled, eventually consistent)
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    /// Opaque public identifier used in every route
    pub token: String,
    pub chats_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for Application data access operations.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert a new application with the given token.
    async fn create(&self, name: &str, token: &str) -> Result<Application, AppError>;

    /// Find an application by its public token.
    async fn find_by_token(&self, token: &str) -> Result<Option<Application>, AppError>;

    /// List all applications ordered by id.
    async fn list(&self) -> Result<Vec<Application>, AppError>;

    /// Rename an application. Returns `None` when the token is unknown.
    async fn update_name(&self, token: &str, name: &str) -> Result<Option<Application>, AppError>;
}
