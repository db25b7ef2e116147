//! Analysis-result archive with article mappings.

use sqlx::SqlitePool;

use crate::models::analysis::AnalysisRecordRow;
use crate::models::{AnalysisRecord, NewAnalysisRecord};
use crate::utils::ApiResult;
use crate::utils::datetime::{format_datetime, now_naive};

const ANALYSIS_COLUMNS: &str = "id, analysis_timestamp, analysis_type, analysis_result_text, \
     meta_news_count, meta_news_titles, meta_news_sources, meta_categories, meta_groups, \
     meta_article_ids, meta_analysis_params, meta_error_info";

#[derive(Clone)]
pub struct AnalysisStore {
    pool: SqlitePool,
}

impl AnalysisStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Archive one analysis and map it to the articles it covered. The insert
    /// and its mapping rows share a transaction; mapping duplicates are
    /// ignored.
    pub async fn add_analysis(
        &self,
        record: &NewAnalysisRecord,
        article_ids_to_map: &[i64],
    ) -> ApiResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"INSERT INTO llm_analyses
               (analysis_timestamp, analysis_type, analysis_result_text, meta_news_count,
                meta_news_titles, meta_news_sources, meta_categories, meta_groups,
                meta_article_ids, meta_analysis_params, meta_error_info)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(format_datetime(&now_naive()))
        .bind(&record.analysis_type)
        .bind(&record.analysis_result_text)
        .bind(record.meta_news_count)
        .bind(serde_json::to_string(&record.meta_news_titles)?)
        .bind(serde_json::to_string(&record.meta_news_sources)?)
        .bind(serde_json::to_string(&record.meta_categories)?)
        .bind(record.meta_groups.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&record.meta_article_ids)?)
        .bind(record.meta_analysis_params.as_ref().map(serde_json::to_string).transpose()?)
        .bind(record.meta_error_info.as_ref().map(serde_json::to_string).transpose()?)
        .execute(&mut *tx)
        .await?;

        let analysis_id = result.last_insert_rowid();

        for article_id in article_ids_to_map {
            sqlx::query(
                "INSERT OR IGNORE INTO article_analysis_mappings (article_id, analysis_id) \
                 VALUES (?, ?)",
            )
            .bind(article_id)
            .bind(analysis_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            "Archived analysis {} ({}) mapped to {} articles",
            analysis_id,
            record.analysis_type,
            article_ids_to_map.len()
        );
        Ok(analysis_id)
    }

    pub async fn get_analysis(&self, id: i64) -> ApiResult<Option<AnalysisRecord>> {
        let row: Option<AnalysisRecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM llm_analyses WHERE id = ?",
            ANALYSIS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AnalysisRecord::from))
    }

    /// All analyses linked to an article, newest first.
    pub async fn get_analyses_for_article(&self, article_id: i64) -> ApiResult<Vec<AnalysisRecord>> {
        let rows: Vec<AnalysisRecordRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM llm_analyses a
               JOIN article_analysis_mappings m ON m.analysis_id = a.id
               WHERE m.article_id = ?
               ORDER BY a.analysis_timestamp DESC"#,
            ANALYSIS_COLUMNS.replace("id,", "a.id,")
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AnalysisRecord::from).collect())
    }

    pub async fn list_analyses(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ApiResult<Vec<AnalysisRecord>> {
        let rows: Vec<AnalysisRecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM llm_analyses ORDER BY analysis_timestamp DESC LIMIT ? OFFSET ?",
            ANALYSIS_COLUMNS
        ))
        .bind(limit.unwrap_or(100))
        .bind(offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AnalysisRecord::from).collect())
    }

    /// Mapping rows cascade away with the record.
    pub async fn delete_analysis(&self, id: i64) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM llm_analyses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM llm_analyses").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
