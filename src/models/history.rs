use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::datetime::parse_db_datetime;

/// One browsing-history row, joined with the article it references.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub id: i64,
    pub article_id: i64,
    pub view_time: NaiveDateTime,
    pub title: Option<String>,
    pub link: String,
    pub source_name: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct HistoryEntryRow {
    pub id: i64,
    pub article_id: i64,
    pub view_time: String,
    pub title: Option<String>,
    pub link: String,
    pub source_name: Option<String>,
}

impl From<HistoryEntryRow> for HistoryEntry {
    fn from(row: HistoryEntryRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            view_time: parse_db_datetime("view_time", &row.view_time)
                .unwrap_or_else(|| chrono::Utc::now().naive_utc()),
            title: row.title,
            link: row.link,
            source_name: row.source_name,
        }
    }
}
