//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

/// Create or rename application request
#[derive(Debug, Deserialize, Validate)]
pub struct ApplicationRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

/// Create message request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, message = "Body must not be empty"))]
    pub body: String,
}

/// Message list query (`?after=&limit=`)
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MessageListQuery {
    #[validate(range(min = 0, message = "after must not be negative"))]
    pub after: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "limit must be 1-100"))]
    pub limit: Option<i64>,
}

/// Search query (`?q=`)
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 1024, message = "q must be 1-1024 characters"))]
    pub q: String,
}
