//! Application Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::ApplicationRequest;
use crate::application::dto::response::ApplicationResponse;
use crate::presentation::http::extractors::ValidatedJson;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// List all applications
pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let applications = state.applications.list_applications().await?;
    Ok(Json(
        applications.into_iter().map(ApplicationResponse::from).collect(),
    ))
}

/// Create an application and issue its token
pub async fn create_application(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let application = state.applications.create_application(&body.name).await?;
    Ok((StatusCode::CREATED, Json(ApplicationResponse::from(application))))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let application = state.applications.get_application(&token).await?;
    Ok(Json(ApplicationResponse::from(application)))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(body): ValidatedJson<ApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let application = state
        .applications
        .rename_application(&token, &body.name)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}
