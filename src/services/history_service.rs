//! Browsing history: append-only views joined with their articles.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::models::HistoryEntry;
use crate::models::history::HistoryEntryRow;
use crate::utils::datetime::{format_datetime, now_naive};
use crate::utils::{ApiError, ApiResult};

#[derive(Clone)]
pub struct HistoryService {
    pool: SqlitePool,
}

impl HistoryService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a view. The referenced article must exist; a missing article
    /// surfaces as a not-found error and nothing is inserted.
    pub async fn add_entry(
        &self,
        article_id: i64,
        view_time: Option<NaiveDateTime>,
    ) -> ApiResult<i64> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(ApiError::not_found(format!(
                "Cannot record history: article {} does not exist",
                article_id
            )));
        }

        let view_time = view_time.unwrap_or_else(now_naive);
        let result = sqlx::query(
            "INSERT INTO browsing_history (article_id, view_time) VALUES (?, ?)",
        )
        .bind(article_id)
        .bind(format_datetime(&view_time))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Entries joined with their articles, newest first.
    pub async fn list_entries(
        &self,
        days_limit: Option<i64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ApiResult<Vec<HistoryEntry>> {
        let mut sql = String::from(
            r#"SELECT h.id, h.article_id, h.view_time, a.title, a.link, a.source_name
               FROM browsing_history h
               JOIN articles a ON a.id = h.article_id"#,
        );

        let cutoff = days_limit
            .filter(|d| *d > 0)
            .map(|d| format_datetime(&(now_naive() - chrono::Duration::days(d))));
        if cutoff.is_some() {
            sql.push_str(" WHERE h.view_time >= ?");
        }
        sql.push_str(" ORDER BY h.view_time DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, HistoryEntryRow>(&sql);
        if let Some(cutoff) = &cutoff {
            query = query.bind(cutoff);
        }
        let rows = query
            .bind(limit.unwrap_or(100))
            .bind(offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    /// Most recent view of an article, if any.
    pub async fn latest_entry_for_article(
        &self,
        article_id: i64,
    ) -> ApiResult<Option<HistoryEntry>> {
        let row: Option<HistoryEntryRow> = sqlx::query_as(
            r#"SELECT h.id, h.article_id, h.view_time, a.title, a.link, a.source_name
               FROM browsing_history h
               JOIN articles a ON a.id = h.article_id
               WHERE h.article_id = ?
               ORDER BY h.view_time DESC
               LIMIT 1"#,
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(HistoryEntry::from))
    }

    pub async fn delete_entry(&self, id: i64) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM browsing_history WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM browsing_history").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
