//! Article persistence: upserts keyed by link, filtered listings, read state.

use sqlx::sqlite::SqliteArguments;
use sqlx::{Arguments, SqlitePool};

use crate::models::{
    ARTICLE_SEARCH_FIELDS, ARTICLE_SORT_COLUMNS, Article, ArticleFilter, ArticleQuery,
    ArticleUpsert,
};
use crate::models::article::ArticleRow;
use crate::utils::datetime::{format_datetime, now_naive};
use crate::utils::{ApiError, ApiResult};

const ARTICLE_COLUMNS: &str = "id, link, title, content, summary, source_name, source_url, \
     category_name, publish_time, retrieval_time, image_url, is_read, llm_summary";

#[derive(Clone)]
pub struct ArticleService {
    pool: SqlitePool,
}

impl ArticleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update on link conflict. `retrieval_time` is refreshed on
    /// every call. Returns the row id.
    pub async fn upsert_article(&self, article: &ArticleUpsert) -> ApiResult<i64> {
        if article.link.trim().is_empty() {
            return Err(ApiError::validation_error("Article link cannot be empty"));
        }

        let retrieval_time = format_datetime(&now_naive());
        let publish_time = article.publish_time.as_ref().map(format_datetime);

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO articles
               (link, title, content, summary, source_name, source_url,
                category_name, publish_time, retrieval_time, image_url, is_read, llm_summary)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(link) DO UPDATE SET
                   title = excluded.title,
                   content = excluded.content,
                   summary = excluded.summary,
                   source_name = excluded.source_name,
                   source_url = excluded.source_url,
                   category_name = excluded.category_name,
                   publish_time = excluded.publish_time,
                   retrieval_time = excluded.retrieval_time,
                   image_url = excluded.image_url,
                   is_read = excluded.is_read,
                   llm_summary = excluded.llm_summary
               RETURNING id"#,
        )
        .bind(article.link.trim())
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.summary)
        .bind(&article.source_name)
        .bind(&article.source_url)
        .bind(&article.category_name)
        .bind(&publish_time)
        .bind(&retrieval_time)
        .bind(&article.image_url)
        .bind(if article.is_read { 1 } else { 0 })
        .bind(&article.llm_summary)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Article upserted with link '{}', id {}", article.link, id);
        Ok(id)
    }

    /// Upsert a batch inside one transaction. Items without a link are
    /// skipped with a warning; any database error rolls the batch back.
    pub async fn upsert_articles_batch(&self, articles: &[ArticleUpsert]) -> ApiResult<u64> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;

        for article in articles {
            if article.link.trim().is_empty() {
                tracing::warn!(
                    "Skipping article without link in batch: {:?}",
                    article.title.as_deref().unwrap_or("N/A")
                );
                continue;
            }

            let retrieval_time = format_datetime(&now_naive());
            let publish_time = article.publish_time.as_ref().map(format_datetime);

            let result = sqlx::query(
                r#"INSERT INTO articles
                   (link, title, content, summary, source_name, source_url,
                    category_name, publish_time, retrieval_time, image_url, is_read, llm_summary)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(link) DO UPDATE SET
                       title = excluded.title,
                       content = excluded.content,
                       summary = excluded.summary,
                       source_name = excluded.source_name,
                       source_url = excluded.source_url,
                       category_name = excluded.category_name,
                       publish_time = excluded.publish_time,
                       retrieval_time = excluded.retrieval_time,
                       image_url = excluded.image_url,
                       is_read = excluded.is_read,
                       llm_summary = excluded.llm_summary"#,
            )
            .bind(article.link.trim())
            .bind(&article.title)
            .bind(&article.content)
            .bind(&article.summary)
            .bind(&article.source_name)
            .bind(&article.source_url)
            .bind(&article.category_name)
            .bind(&publish_time)
            .bind(&retrieval_time)
            .bind(&article.image_url)
            .bind(if article.is_read { 1 } else { 0 })
            .bind(&article.llm_summary)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;
        tracing::info!("Batch upsert completed, {} rows affected", affected);
        Ok(affected)
    }

    pub async fn get_article_by_id(&self, id: i64) -> ApiResult<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Article::from))
    }

    pub async fn get_article_by_link(&self, link: &str) -> ApiResult<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE link = ?",
            ARTICLE_COLUMNS
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Article::from))
    }

    pub async fn get_articles_by_links(&self, links: &[String]) -> ApiResult<Vec<Article>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; links.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM articles WHERE link IN ({})",
            ARTICLE_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, ArticleRow>(&sql);
        for link in links {
            query = query.bind(link);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// List articles under the given filters, sorted by a whitelisted column
    /// (anything else falls back to publish_time).
    pub async fn list_articles(&self, query: &ArticleQuery) -> ApiResult<Vec<Article>> {
        let mut sql = format!("SELECT {} FROM articles", ARTICLE_COLUMNS);
        let mut args = SqliteArguments::default();
        Self::push_filters(&mut sql, &mut args, &query.filter);

        let sort_column = query
            .sort_by
            .as_deref()
            .filter(|c| ARTICLE_SORT_COLUMNS.contains(c))
            .unwrap_or("publish_time");
        let direction = if query.sort_desc { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {}", sort_column, direction));

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.add(limit);
            if let Some(offset) = query.offset {
                sql.push_str(" OFFSET ?");
                args.add(offset);
            }
        }

        let rows: Vec<ArticleRow> = sqlx::query_as_with(&sql, args).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    pub async fn count_articles(&self, filter: &ArticleFilter) -> ApiResult<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM articles");
        let mut args = SqliteArguments::default();
        Self::push_filters(&mut sql, &mut args, filter);

        let count: i64 = sqlx::query_scalar_with(&sql, args).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Returns true iff a row was actually updated.
    pub async fn set_read_status(&self, link: &str, is_read: bool) -> ApiResult<bool> {
        let result = sqlx::query("UPDATE articles SET is_read = ? WHERE link = ?")
            .bind(if is_read { 1 } else { 0 })
            .bind(link)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Housekeeping: remove rows that never carried a publish time.
    pub async fn delete_articles_with_null_publish_time(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE publish_time IS NULL")
            .execute(&self.pool)
            .await?;

        tracing::info!("Deleted {} articles with null publish_time", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn purge_articles(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM articles").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Shared WHERE-clause builder for list and count. Every user value is a
    /// bound parameter; only whitelisted field names become SQL literals.
    fn push_filters(sql: &mut String, args: &mut SqliteArguments<'_>, filter: &ArticleFilter) {
        let mut clauses: Vec<String> = Vec::new();

        if let Some(is_read) = filter.is_read {
            clauses.push("is_read = ?".to_string());
            args.add(if is_read { 1 } else { 0 });
        }

        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("category_name = ?".to_string());
            args.add(category.to_string());
        }

        if let Some(ids) = filter.ids.as_ref().filter(|ids| !ids.is_empty()) {
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("id IN ({})", placeholders));
            for id in ids {
                args.add(*id);
            }
        }

        if let Some(term) = filter.search_term.as_deref().filter(|t| !t.is_empty()) {
            let fields: Vec<&str> = match filter.search_fields.as_ref() {
                Some(requested) => ARTICLE_SEARCH_FIELDS
                    .iter()
                    .copied()
                    .filter(|f| requested.iter().any(|r| r == f))
                    .collect(),
                None => vec!["title", "content"],
            };
            let fields = if fields.is_empty() { vec!["title", "content"] } else { fields };

            let pattern = format!("%{}%", term);
            let like_clauses: Vec<String> =
                fields.iter().map(|f| format!("{} LIKE ?", f)).collect();
            clauses.push(format!("({})", like_clauses.join(" OR ")));
            for _ in &fields {
                args.add(pattern.clone());
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }
}
