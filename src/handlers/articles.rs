//! Article and browsing-history API handlers.

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
use crate::models::{ArticleFilter, ArticleQuery, ArticleUpsert};
use crate::utils::ApiError;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ArticleListParams {
    pub is_read: Option<bool>,
    pub category: Option<String>,
    pub search_term: Option<String>,
    pub sort_by: Option<String>,
    pub sort_desc: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<ArticleListParams> for ArticleQuery {
    fn from(params: ArticleListParams) -> Self {
        Self {
            filter: ArticleFilter {
                is_read: params.is_read,
                category: params.category,
                ids: None,
                search_term: params.search_term,
                search_fields: None,
            },
            sort_by: params.sort_by,
            sort_desc: params.sort_desc.unwrap_or(true),
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// List articles
/// GET /api/articles
#[utoipa::path(
    get,
    path = "/api/articles",
    params(ArticleListParams),
    responses(
        (status = 200, description = "Filtered article list", body = Vec<crate::models::Article>)
    ),
    tag = "Articles"
)]
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticleListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query: ArticleQuery = params.into();
    let articles = state.article_service.list_articles(&query).await?;
    Ok(Json(articles))
}

/// Count articles under the same filters
/// GET /api/articles/count
pub async fn count_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticleListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query: ArticleQuery = params.into();
    let count = state.article_service.count_articles(&query.filter).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// Get one article
/// GET /api/articles/:id
#[utoipa::path(
    get,
    path = "/api/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article details", body = crate::models::Article),
        (status = 404, description = "Article not found")
    ),
    tag = "Articles"
)]
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state
        .article_service
        .get_article_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Article {} not found", id)))?;
    Ok(Json(article))
}

/// Upsert an article by link
/// POST /api/articles
#[utoipa::path(
    post,
    path = "/api/articles",
    request_body = ArticleUpsert,
    responses((status = 201, description = "Article stored")),
    tag = "Articles"
)]
pub async fn upsert_article(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ArticleUpsert>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.article_service.upsert_article(&req).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Upsert a batch of articles
/// POST /api/articles/batch
pub async fn upsert_articles_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Vec<ArticleUpsert>>,
) -> Result<impl IntoResponse, ApiError> {
    let affected = state.article_service.upsert_articles_batch(&req).await?;
    Ok(Json(serde_json::json!({ "affected": affected })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadStatusRequest {
    pub link: String,
    pub is_read: bool,
}

/// Flip the read flag of an article
/// PUT /api/articles/read-status
pub async fn set_read_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReadStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .article_service
        .set_read_status(&req.link, req.is_read)
        .await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// Housekeeping: drop articles without a publish time
/// DELETE /api/articles/null-publish-time
pub async fn delete_articles_with_null_publish_time(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .article_service
        .delete_articles_with_null_publish_time()
        .await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

/// Analyses archived for one article, newest first
/// GET /api/articles/:id/analyses
pub async fn get_article_analyses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let analyses = state.analysis_store.get_analyses_for_article(id).await?;
    Ok(Json(analyses))
}

// ============================================================================
// Browsing history
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    pub days_limit: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Browsing history joined with articles, newest first
/// GET /api/history
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .history_service
        .list_entries(params.days_limit, params.limit, params.offset)
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddHistoryRequest {
    pub article_id: i64,
}

/// Record a view of an article
/// POST /api/history
pub async fn add_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddHistoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.history_service.add_entry(req.article_id, None).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Delete one history entry
/// DELETE /api/history/:id
pub async fn delete_history_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.history_service.delete_entry(id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("History entry {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Clear all browsing history
/// DELETE /api/history
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.history_service.clear().await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
