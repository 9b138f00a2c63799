//! Chat Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::response::{ChatCreatedResponse, ChatResponse};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// List the persisted chats of an application
pub async fn list_chats(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let chats = state.chats.list_chats(&token).await?;
    Ok(Json(chats.into_iter().map(ChatResponse::from).collect()))
}

/// Allocate a chat number and queue the chat's creation.
///
/// Responds 202: the chat row is written asynchronously.
pub async fn create_chat(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<ChatCreatedResponse>), AppError> {
    let chat_number = state.chats.create_chat(&token).await?;
    Ok((StatusCode::ACCEPTED, Json(ChatCreatedResponse { chat_number })))
}
