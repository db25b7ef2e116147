use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::datetime::{parse_datetime, parse_db_datetime};

/// A single news item, uniquely identified by its link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Article {
    pub id: i64,
    pub link: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub category_name: Option<String>,
    pub publish_time: Option<NaiveDateTime>,
    pub retrieval_time: NaiveDateTime,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub llm_summary: Option<String>,
}

impl Article {
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("无标题")
    }

    pub fn source_or_default(&self) -> &str {
        self.source_name.as_deref().unwrap_or("未知来源")
    }
}

/// Raw row shape: timestamps stay TEXT in SQLite and go through the lenient
/// parser on the way out.
#[derive(Debug, FromRow)]
pub(crate) struct ArticleRow {
    pub id: i64,
    pub link: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub category_name: Option<String>,
    pub publish_time: Option<String>,
    pub retrieval_time: String,
    pub image_url: Option<String>,
    pub is_read: i64,
    pub llm_summary: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        let retrieval_time = parse_db_datetime("retrieval_time", &row.retrieval_time)
            .unwrap_or_else(|| chrono::Utc::now().naive_utc());
        Self {
            id: row.id,
            link: row.link,
            title: row.title,
            content: row.content,
            summary: row.summary,
            source_name: row.source_name,
            source_url: row.source_url,
            category_name: row.category_name,
            publish_time: row
                .publish_time
                .as_deref()
                .and_then(|v| parse_db_datetime("publish_time", v)),
            retrieval_time,
            image_url: row.image_url,
            is_read: row.is_read != 0,
            llm_summary: row.llm_summary,
        }
    }
}

/// Upsert payload; `link` is the identity, everything else is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ArticleUpsert {
    pub link: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub category_name: Option<String>,
    /// Accepts ISO-8601 with offsets or a trailing `Z`; normalized to naive UTC
    #[serde(default, deserialize_with = "deserialize_lenient_datetime")]
    #[schema(value_type = Option<String>)]
    pub publish_time: Option<NaiveDateTime>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub llm_summary: Option<String>,
}

fn deserialize_lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
    }
}

/// Whitelisted sort columns for article listings.
pub const ARTICLE_SORT_COLUMNS: &[&str] =
    &["publish_time", "retrieval_time", "title", "source_name", "category_name", "id"];

/// Whitelisted LIKE-search fields.
pub const ARTICLE_SEARCH_FIELDS: &[&str] = &["title", "content", "summary", "source_name"];

/// Filters shared by the list and count queries.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ArticleFilter {
    pub is_read: Option<bool>,
    pub category: Option<String>,
    pub ids: Option<Vec<i64>>,
    pub search_term: Option<String>,
    /// Subset of [`ARTICLE_SEARCH_FIELDS`]; unknown names are ignored
    pub search_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ArticleQuery {
    #[serde(flatten)]
    pub filter: ArticleFilter,
    /// Sort column; anything outside the whitelist falls back to publish_time
    pub sort_by: Option<String>,
    #[serde(default = "default_sort_desc")]
    pub sort_desc: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn default_sort_desc() -> bool {
    true
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            filter: ArticleFilter::default(),
            sort_by: None,
            sort_desc: true,
            limit: None,
            offset: None,
        }
    }
}
