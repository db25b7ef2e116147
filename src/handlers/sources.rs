//! News source API handlers, including the status-refresh entry point.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{CreateSourceRequest, UpdateSourceRequest};
use crate::utils::ApiError;

/// List all sources
/// GET /api/sources
#[utoipa::path(
    get,
    path = "/api/sources",
    responses(
        (status = 200, description = "All registered sources", body = Vec<crate::models::NewsSource>)
    ),
    tag = "Sources"
)]
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = state.source_service.list_sources().await?;
    Ok(Json(sources))
}

/// Register a new source
/// POST /api/sources
#[utoipa::path(
    post,
    path = "/api/sources",
    request_body = CreateSourceRequest,
    responses(
        (status = 201, description = "Source created", body = crate::models::NewsSource),
        (status = 409, description = "Source name already exists")
    ),
    tag = "Sources"
)]
pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state.source_service.add_source(&req).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

/// Partially update a source by name
/// PUT /api/sources/:name
pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateSourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.source_service.update_source(&name, &req).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// Delete a source by name
/// DELETE /api/sources/:name
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state
        .source_service
        .get_source_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Source '{}' not found", name)))?;
    state.source_service.delete_source(source.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Restrict the batch to these source names; all enabled when omitted
    pub names: Option<Vec<String>>,
}

/// Run a status-check batch over enabled sources
/// POST /api/sources/refresh
#[utoipa::path(
    post,
    path = "/api/sources/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Batch summary", body = crate::services::BatchSummary)
    ),
    tag = "Sources"
)]
pub async fn refresh_sources(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .source_status_service
        .check_sources(req.names.as_deref())
        .await?;
    Ok(Json(summary))
}

/// Request cancellation of the running batch
/// POST /api/sources/refresh/cancel
pub async fn cancel_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.source_status_service.cancel_batch();
    Ok(StatusCode::ACCEPTED)
}
