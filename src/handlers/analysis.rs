//! Analysis API: grouping, LLM-backed analysis runs, archived records.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;
use crate::models::Article;
use crate::services::AnalysisError;
use crate::utils::ApiError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunAnalysisRequest {
    pub article_ids: Vec<i64>,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    pub custom_prompt: Option<String>,
}

fn default_analysis_type() -> String {
    "新闻相似度分析".to_string()
}

/// Run an LLM analysis over the selected articles.
/// POST /api/analysis/run
///
/// Data-shape problems are client errors; LLM failures come back as a
/// `{"error": …}` body so the presentation surface can render them inline.
#[utoipa::path(
    post,
    path = "/api/analysis/run",
    request_body = RunAnalysisRequest,
    responses(
        (status = 200, description = "Analysis result or {error} body"),
        (status = 400, description = "Empty or invalid selection")
    ),
    tag = "Analysis"
)]
pub async fn run_analysis(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunAnalysisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = load_selection(&state, &req.article_ids).await?;

    match state
        .analysis_engine
        .analyze_news(&articles, &req.analysis_type, req.custom_prompt.as_deref())
        .await
    {
        Ok(output) => Ok(Json(serde_json::to_value(output)?)),
        Err(AnalysisError::DataProcessing(message)) => Err(ApiError::validation_error(message)),
        Err(AnalysisError::LlmService(message)) => {
            Ok(Json(serde_json::json!({ "error": message })))
        },
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupRequest {
    pub article_ids: Vec<i64>,
    #[serde(default = "default_group_method")]
    pub method: String,
}

fn default_group_method() -> String {
    "title_similarity".to_string()
}

/// Group related articles
/// POST /api/analysis/group
pub async fn group_news(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = load_selection(&state, &req.article_ids).await?;
    let grouping = state.data_processor.auto_group_news(&articles, &req.method).await?;
    Ok(Json(grouping))
}

/// Reload all articles and rebuild category buckets
/// POST /api/analysis/load
pub async fn load_news(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let items = state.data_processor.load_news_data().await?;
    Ok(Json(serde_json::json!({ "loaded": items.len() })))
}

/// Articles in one category bucket ("all" for everything)
/// GET /api/analysis/categories/:id
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.data_processor.get_news_by_category(&id).await;
    Ok(Json(serde_json::json!({
        "category": id,
        "name": state.data_processor.get_category_name(&id),
        "items": items,
    })))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAnalysesParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Archived analyses, newest first
/// GET /api/analyses
pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAnalysesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let analyses = state
        .analysis_store
        .list_analyses(params.limit, params.offset)
        .await?;
    Ok(Json(analyses))
}

/// Delete one archived analysis (mappings cascade)
/// DELETE /api/analyses/:id
pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.analysis_store.delete_analysis(id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("Analysis {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every archived analysis
/// DELETE /api/analyses
pub async fn delete_all_analyses(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.analysis_store.delete_all().await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn load_selection(state: &AppState, ids: &[i64]) -> Result<Vec<Article>, ApiError> {
    let mut articles = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(article) = state.article_service.get_article_by_id(id).await? {
            articles.push(article);
        } else {
            tracing::warn!("Selection references missing article {}", id);
        }
    }
    Ok(articles)
}
