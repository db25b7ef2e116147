//! News source registry: CRUD, preset seeding, status write-back.

use async_trait::async_trait;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Arguments, SqlitePool};

use crate::models::source::NewsSourceRow;
use crate::models::{
    CreateSourceRequest, NewsSource, SourceHealth, SourceStatusUpdate, SourceType,
    UpdateSourceRequest,
};
use crate::utils::datetime::format_datetime;
use crate::utils::{ApiError, ApiResult, StringExt, clean_optional_string};

const SOURCE_COLUMNS: &str = "id, name, source_type, url, category_name, is_enabled, \
     is_user_added, custom_config, notes, last_checked_time, status, last_error, \
     consecutive_error_count";

/// OPML exchange seam. File parsing stays outside the core; implementations
/// translate between an OPML document and the source registry.
#[async_trait]
pub trait OpmlGateway: Send + Sync {
    /// Write all sources to `path`. Returns (success, user-facing message).
    async fn export_sources(&self, sources: &[NewsSource], path: &str) -> (bool, String);

    /// Read sources from `path`, handing each to `import`. Returns
    /// (success, user-facing message).
    async fn import_sources(
        &self,
        path: &str,
        import: &(dyn Fn(CreateSourceRequest) + Send + Sync),
    ) -> (bool, String);
}

#[derive(Clone)]
pub struct SourceService {
    pool: SqlitePool,
}

impl SourceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_source(&self, req: &CreateSourceRequest) -> ApiResult<NewsSource> {
        let name = req.name.trimmed();
        if name.is_empty() {
            return Err(ApiError::validation_error("Source name cannot be empty"));
        }

        let url = clean_optional_string(req.url.as_ref());
        if req.source_type == SourceType::Rss && url.is_none() {
            return Err(ApiError::validation_error("RSS sources require a url"));
        }

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM news_sources WHERE name = ?")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(ApiError::conflict(format!("Source name '{}' already exists", name)));
        }

        let custom_config = req
            .custom_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let category = req
            .category_name
            .as_deref()
            .and_then(|c| c.clean())
            .unwrap_or_else(|| "未分类".to_string());

        let result = sqlx::query(
            r#"INSERT INTO news_sources
               (name, source_type, url, category_name, is_enabled, is_user_added,
                custom_config, notes, status, consecutive_error_count)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'unknown', 0)"#,
        )
        .bind(&name)
        .bind(req.source_type.as_str())
        .bind(&url)
        .bind(&category)
        .bind(if req.is_enabled { 1 } else { 0 })
        .bind(if req.is_user_added { 1 } else { 0 })
        .bind(&custom_config)
        .bind(&req.notes)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!("Source created: {} (id {})", name, id);
        self.get_source(id).await?.ok_or_else(|| {
            ApiError::internal(format!("Source {} vanished right after insert", id))
        })
    }

    pub async fn get_source(&self, id: i64) -> ApiResult<Option<NewsSource>> {
        let row: Option<NewsSourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM news_sources WHERE id = ?",
            SOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NewsSource::from))
    }

    pub async fn get_source_by_name(&self, name: &str) -> ApiResult<Option<NewsSource>> {
        let row: Option<NewsSourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM news_sources WHERE name = ?",
            SOURCE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NewsSource::from))
    }

    pub async fn list_sources(&self) -> ApiResult<Vec<NewsSource>> {
        let rows: Vec<NewsSourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM news_sources ORDER BY name ASC",
            SOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NewsSource::from).collect())
    }

    pub async fn list_enabled_sources(&self) -> ApiResult<Vec<NewsSource>> {
        let rows: Vec<NewsSourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM news_sources WHERE is_enabled = 1 ORDER BY name ASC",
            SOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NewsSource::from).collect())
    }

    /// Partial update for user edits. Editing the url or re-enabling a source
    /// resets its health to unknown and clears the last error.
    pub async fn update_source(&self, name: &str, req: &UpdateSourceRequest) -> ApiResult<bool> {
        let current = self
            .get_source_by_name(name)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Source '{}' not found", name)))?;

        let mut sql = String::from("UPDATE news_sources SET name = name");
        let mut args = SqliteArguments::default();

        if let Some(url) = clean_optional_string(req.url.as_ref()) {
            sql.push_str(", url = ?");
            args.add(url);
        }
        if let Some(category) = clean_optional_string(req.category_name.as_ref()) {
            sql.push_str(", category_name = ?");
            args.add(category);
        }
        if let Some(enabled) = req.is_enabled {
            sql.push_str(", is_enabled = ?");
            args.add(if enabled { 1 } else { 0 });
        }
        if let Some(config) = &req.custom_config {
            sql.push_str(", custom_config = ?");
            args.add(serde_json::to_string(config)?);
        }
        if let Some(notes) = &req.notes {
            sql.push_str(", notes = ?");
            args.add(notes.clone());
        }

        let re_enabled = req.is_enabled == Some(true) && !current.is_enabled;
        let url_changed =
            clean_optional_string(req.url.as_ref()).is_some_and(|u| Some(u) != current.url);
        if re_enabled || url_changed {
            sql.push_str(", status = 'unknown', last_error = NULL");
        }

        sql.push_str(" WHERE name = ?");
        args.add(name.to_string());

        let result = sqlx::query_with(&sql, args).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write back the outcome of a status-check probe.
    pub async fn update_source_status(
        &self,
        name: &str,
        update: &SourceStatusUpdate,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            r#"UPDATE news_sources SET
               status = ?, last_error = ?, consecutive_error_count = ?, last_checked_time = ?
               WHERE name = ?"#,
        )
        .bind(update.status.as_str())
        .bind(&update.last_error)
        .bind(update.consecutive_error_count)
        .bind(format_datetime(&update.last_checked_time))
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the source row; article rows are untouched.
    pub async fn delete_source(&self, id: i64) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM news_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Seed the preset sources on a freshly created database.
    pub async fn seed_presets(&self) -> ApiResult<usize> {
        let presets = [
            CreateSourceRequest {
                name: "澎湃新闻".to_string(),
                source_type: SourceType::Pengpai,
                url: None,
                category_name: Some("综合".to_string()),
                is_enabled: true,
                is_user_added: false,
                custom_config: None,
                notes: Some("内置来源".to_string()),
            },
            CreateSourceRequest {
                name: "BBC World".to_string(),
                source_type: SourceType::Rss,
                url: Some("https://feeds.bbci.co.uk/news/world/rss.xml".to_string()),
                category_name: Some("国际".to_string()),
                is_enabled: true,
                is_user_added: false,
                custom_config: None,
                notes: Some("内置来源".to_string()),
            },
        ];

        let mut seeded = 0;
        for preset in &presets {
            match self.add_source(preset).await {
                Ok(_) => seeded += 1,
                Err(e) if e.is_integrity_violation() => {
                    tracing::debug!("Preset source '{}' already present", preset.name)
                },
                Err(e) => return Err(e),
            }
        }

        tracing::info!("Seeded {} preset sources", seeded);
        Ok(seeded)
    }

    /// Marks the unknown state a source returns to after its error is cleared.
    pub async fn reset_source_health(&self, name: &str) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE news_sources SET status = ?, last_error = NULL WHERE name = ?",
        )
        .bind(SourceHealth::Unknown.as_str())
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
