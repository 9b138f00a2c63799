//! Message Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CreateMessageRequest, MessageListQuery, SearchQuery};
use crate::application::dto::response::{
    MessageCreatedResponse, MessageResponse, MessageSearchResponse,
};
use crate::application::services::MessageQueryDto;
use crate::presentation::http::extractors::{ValidatedJson, ValidatedQuery};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Get persisted messages of a chat, ascending by number
pub async fn list_messages(
    State(state): State<AppState>,
    Path((token, chat_number)): Path<(String, i64)>,
    ValidatedQuery(query): ValidatedQuery<MessageListQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let query = MessageQueryDto {
        after: query.after,
        limit: query.limit,
    };

    let messages = state
        .messages
        .list_messages(&token, chat_number, query)
        .await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Allocate a message number and queue the message's creation.
///
/// The chat must already be persisted; a chat whose creation is still
/// queued is reported as not found.
pub async fn create_message(
    State(state): State<AppState>,
    Path((token, chat_number)): Path<(String, i64)>,
    ValidatedJson(body): ValidatedJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageCreatedResponse>), AppError> {
    let message_number = state
        .messages
        .create_message(&token, chat_number, &body.body)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageCreatedResponse { message_number }),
    ))
}

/// Full-text search within a chat
pub async fn search_messages(
    State(state): State<AppState>,
    Path((token, chat_number)): Path<(String, i64)>,
    ValidatedQuery(query): ValidatedQuery<SearchQuery>,
) -> Result<Json<MessageSearchResponse>, AppError> {
    let hits = state
        .messages
        .search_messages(&token, chat_number, &query.q)
        .await?;
    Ok(Json(MessageSearchResponse {
        messages: hits.into_iter().map(MessageResponse::from).collect(),
    }))
}
