//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **ApplicationRepository** - Application CRUD, lookup by token
//! - **ChatRepository** - Chat inserts with pre-allocated numbers
//! - **MessageRepository** - Message inserts, keyset pagination by number
//! - **CounterRepository** - Bulk recomputation of denormalized counters
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use chat_system::infrastructure::repositories::{
//!     PgApplicationRepository, PgChatRepository, PgCounterRepository, PgMessageRepository,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let applications = PgApplicationRepository::new(pool.clone());
//!     let chats = PgChatRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool.clone());
//!     let counters = PgCounterRepository::new(pool);
//! }
//! ```

pub mod application_repository;
pub mod chat_repository;
pub mod counter_repository;
pub mod message_repository;

pub use application_repository::PgApplicationRepository;
pub use chat_repository::PgChatRepository;
pub use counter_repository::PgCounterRepository;
pub use message_repository::PgMessageRepository;

use crate::shared::error::AppError;

/// Map constraint violations of an insert to domain errors.
///
/// Unique violations become `Conflict`, a missing parent row `NotFound`.
pub(crate) fn map_insert_error(e: sqlx::Error, conflict: &str, missing_parent: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(conflict.to_string())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound(missing_parent.to_string())
        }
        _ => AppError::Database(e),
    }
}
