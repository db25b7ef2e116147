//! LLM profile management handlers.

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
use crate::services::llm::{LLMError, LLMService, LlmProfileInfo, UpsertProfileRequest};

/// List profiles (keys masked)
/// GET /api/llm/configs
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LlmApiError> {
    let active = state.config_manager.get_active_config_name().await?;
    let names = state.config_manager.get_config_names().await?;

    let mut infos = Vec::with_capacity(names.len());
    for name in names {
        if let Some(profile) = state.config_manager.get_config(&name).await? {
            let is_active = active.as_deref() == Some(profile.name.as_str());
            infos.push(LlmProfileInfo::from_profile(&profile, is_active));
        }
    }
    Ok(Json(infos))
}

/// Get one profile (key masked)
/// GET /api/llm/configs/:name
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, LlmApiError> {
    let profile = state
        .config_manager
        .get_config(&name)
        .await?
        .ok_or(LLMError::ProfileNotFound(name))?;
    let active = state.config_manager.get_active_config_name().await?;
    let is_active = active.as_deref() == Some(profile.name.as_str());
    Ok(Json(LlmProfileInfo::from_profile(&profile, is_active)))
}

/// Create or replace a profile
/// PUT /api/llm/configs/:name
pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<impl IntoResponse, LlmApiError> {
    state.config_manager.add_or_update_config(&name, &req).await?;

    // a save to the active profile must be visible to the running service
    if state.config_manager.get_active_config_name().await?.as_deref() == Some(name.as_str()) {
        state.llm_service.reload_active_config().await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a profile
/// DELETE /api/llm/configs/:name
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, LlmApiError> {
    let was_active =
        state.config_manager.get_active_config_name().await?.as_deref() == Some(name.as_str());
    let deleted = state.config_manager.delete_config(&name).await?;
    if !deleted {
        return Err(LlmApiError(LLMError::ProfileNotFound(name)));
    }
    if was_active {
        state.llm_service.reload_active_config().await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivateRequest {
    pub name: Option<String>,
}

/// Elect (or clear) the active profile
/// PUT /api/llm/configs/active
pub async fn set_active_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateRequest>,
) -> Result<impl IntoResponse, LlmApiError> {
    let accepted = state
        .config_manager
        .set_active_config_name(req.name.as_deref())
        .await?;

    if !accepted {
        let name = req.name.unwrap_or_default();
        return Err(LlmApiError(LLMError::ProfileNotFound(name)));
    }

    state.llm_service.reload_active_config().await?;
    Ok(Json(serde_json::json!({ "active": req.name })))
}

/// Active profile details (key masked)
/// GET /api/llm/configs/active
pub async fn get_active_profile(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LlmApiError> {
    let profile = state.config_manager.get_active_config().await?;
    Ok(Json(profile.map(|p| LlmProfileInfo::from_profile(&p, true))))
}

/// Probe connectivity of one profile
/// POST /api/llm/configs/:name/test
pub async fn test_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, LlmApiError> {
    let profile = state
        .config_manager
        .get_config(&name)
        .await?
        .ok_or(LLMError::ProfileNotFound(name))?;

    let (success, message) = state.llm_service.test_connection_with_config(&profile).await;
    Ok(Json(serde_json::json!({ "success": success, "message": message })))
}

/// Service status for the UI header
/// GET /api/llm/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LlmApiError> {
    let active = state.config_manager.get_active_config_name().await?;
    let names = state.config_manager.get_config_names().await?;
    Ok(Json(serde_json::json!({
        "configured": state.llm_service.is_configured(),
        "active_config": active,
        "profile_count": names.len(),
    })))
}

// ============================================================================
// Error handling
// ============================================================================

pub struct LlmApiError(pub LLMError);

impl From<LLMError> for LlmApiError {
    fn from(err: LLMError) -> Self {
        Self(err)
    }
}

impl IntoResponse for LlmApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            LLMError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            LLMError::ProfileNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            LLMError::EmptyProfileName => (StatusCode::BAD_REQUEST, self.0.to_string()),
            LLMError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            LLMError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.0.to_string()),
            LLMError::ApiError(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            LLMError::ParseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
            LLMError::DatabaseError(e) => {
                tracing::error!("LLM database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            },
            LLMError::SerializationError(e) => {
                tracing::error!("LLM serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Serialization error: {}", e))
            },
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
