//! Application Service
//!
//! Plain CRUD over applications. An application is addressed externally
//! only by its token.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Application, ApplicationRepository};
use crate::shared::error::AppError;

/// Random bytes in a token, rendered as hex
const TOKEN_BYTES: usize = 32;

/// Application service trait
#[async_trait]
pub trait ApplicationService: Send + Sync {
    /// Create an application with a fresh token
    async fn create_application(&self, name: &str) -> Result<Application, AppError>;

    async fn list_applications(&self) -> Result<Vec<Application>, AppError>;

    async fn get_application(&self, token: &str) -> Result<Application, AppError>;

    async fn rename_application(&self, token: &str, name: &str) -> Result<Application, AppError>;
}

/// Generate an application token: 32 random bytes, lowercase hex.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// ApplicationService implementation
pub struct ApplicationServiceImpl {
    repo: Arc<dyn ApplicationRepository>,
}

impl ApplicationServiceImpl {
    pub fn new(repo: Arc<dyn ApplicationRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ApplicationService for ApplicationServiceImpl {
    async fn create_application(&self, name: &str) -> Result<Application, AppError> {
        let application = self.repo.create(name, &generate_token()).await?;
        info!(application_id = application.id, "Application created");
        Ok(application)
    }

    async fn list_applications(&self) -> Result<Vec<Application>, AppError> {
        self.repo.list().await
    }

    async fn get_application(&self, token: &str) -> Result<Application, AppError> {
        self.repo
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".into()))
    }

    async fn rename_application(&self, token: &str, name: &str) -> Result<Application, AppError> {
        self.repo
            .update_name(token, name)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".into()))
    }
}
