use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::datetime::parse_db_datetime;

/// Archived LLM analysis, with its JSON metadata fields decoded.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisRecord {
    pub id: i64,
    pub analysis_timestamp: NaiveDateTime,
    pub analysis_type: String,
    pub analysis_result_text: Option<String>,
    pub meta_news_count: Option<i64>,
    pub meta_news_titles: Vec<String>,
    pub meta_news_sources: Vec<String>,
    pub meta_categories: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub meta_groups: Option<serde_json::Value>,
    pub meta_article_ids: Vec<i64>,
    #[schema(value_type = Option<Object>)]
    pub meta_analysis_params: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub meta_error_info: Option<serde_json::Value>,
}

#[derive(Debug, FromRow)]
pub(crate) struct AnalysisRecordRow {
    pub id: i64,
    pub analysis_timestamp: String,
    pub analysis_type: String,
    pub analysis_result_text: Option<String>,
    pub meta_news_count: Option<i64>,
    pub meta_news_titles: Option<String>,
    pub meta_news_sources: Option<String>,
    pub meta_categories: Option<String>,
    pub meta_groups: Option<String>,
    pub meta_article_ids: Option<String>,
    pub meta_analysis_params: Option<String>,
    pub meta_error_info: Option<String>,
}

fn decode_list<T: serde::de::DeserializeOwned>(field: &str, raw: Option<&str>) -> Vec<T> {
    match raw {
        None => Vec::new(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            tracing::warn!("Unparsable {} JSON '{}': {}", field, text, e);
            Vec::new()
        }),
    }
}

fn decode_value(field: &str, raw: Option<&str>) -> Option<serde_json::Value> {
    raw.and_then(|text| {
        serde_json::from_str(text)
            .map_err(|e| {
                tracing::warn!("Unparsable {} JSON '{}': {}", field, text, e);
                e
            })
            .ok()
    })
}

impl From<AnalysisRecordRow> for AnalysisRecord {
    fn from(row: AnalysisRecordRow) -> Self {
        Self {
            id: row.id,
            analysis_timestamp: parse_db_datetime("analysis_timestamp", &row.analysis_timestamp)
                .unwrap_or_else(|| chrono::Utc::now().naive_utc()),
            analysis_type: row.analysis_type,
            analysis_result_text: row.analysis_result_text,
            meta_news_count: row.meta_news_count,
            meta_news_titles: decode_list("meta_news_titles", row.meta_news_titles.as_deref()),
            meta_news_sources: decode_list("meta_news_sources", row.meta_news_sources.as_deref()),
            meta_categories: decode_list("meta_categories", row.meta_categories.as_deref()),
            meta_groups: decode_value("meta_groups", row.meta_groups.as_deref()),
            meta_article_ids: decode_list("meta_article_ids", row.meta_article_ids.as_deref()),
            meta_analysis_params: decode_value(
                "meta_analysis_params",
                row.meta_analysis_params.as_deref(),
            ),
            meta_error_info: decode_value("meta_error_info", row.meta_error_info.as_deref()),
        }
    }
}

/// Input shape for archiving a fresh analysis.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewAnalysisRecord {
    pub analysis_type: String,
    pub analysis_result_text: Option<String>,
    pub meta_news_count: Option<i64>,
    #[serde(default)]
    pub meta_news_titles: Vec<String>,
    #[serde(default)]
    pub meta_news_sources: Vec<String>,
    #[serde(default)]
    pub meta_categories: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub meta_groups: Option<serde_json::Value>,
    #[serde(default)]
    pub meta_article_ids: Vec<i64>,
    #[schema(value_type = Option<Object>)]
    pub meta_analysis_params: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub meta_error_info: Option<serde_json::Value>,
}
