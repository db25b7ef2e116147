//! Database bootstrap: pool creation, schema DDL, additive migrations.

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Schema executed when the database file is created for the first time.
pub const DEFAULT_SCHEMA: &str = include_str!("../migrations/schema.sql");

/// An open database plus the flag callers use to seed defaults.
pub struct Database {
    pub pool: SqlitePool,
    /// True when the schema was created by this open (fresh file or :memory:)
    pub just_created: bool,
}

/// Open (and if needed create) the database behind `database_url`.
///
/// `ddl_path` overrides the embedded schema, mirroring the configurable DDL
/// file of the desktop build. Foreign keys are enforced on every connection.
pub async fn open(database_url: &str, ddl_path: Option<&str>) -> Result<Database, anyhow::Error> {
    let file_path = sqlite_file_path(database_url);
    let existed_before = file_path.as_deref().map(|p| Path::new(p).exists()).unwrap_or(false);

    if let Some(path) = file_path.as_deref()
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // an in-memory database exists per connection, so it must never be
    // spread across a pool
    let max_connections = if file_path.is_some() { 5 } else { 1 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    let just_created = !existed_before;

    if just_created {
        let ddl = match ddl_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => DEFAULT_SCHEMA.to_string(),
        };
        run_ddl(&pool, &ddl).await?;
        tracing::info!("Database schema created ({})", database_url);
    }

    // Additive status-column migrations run on every open; pre-status
    // databases gain the columns, current ones report duplicates we swallow.
    migrate_source_status_columns(&pool).await;

    Ok(Database { pool, just_created })
}

/// Extract the on-disk path from a sqlite URL, or None for :memory:.
fn sqlite_file_path(database_url: &str) -> Option<String> {
    let rest = database_url.strip_prefix("sqlite://").or_else(|| database_url.strip_prefix("sqlite:"))?;
    if rest == ":memory:" || rest.is_empty() {
        return None;
    }
    Some(rest.split('?').next().unwrap_or(rest).to_string())
}

async fn run_ddl(pool: &SqlitePool, ddl: &str) -> Result<(), sqlx::Error> {
    for statement in ddl.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

async fn migrate_source_status_columns(pool: &SqlitePool) {
    let columns = [
        ("status", "TEXT DEFAULT 'unknown'"),
        ("last_error", "TEXT"),
        ("consecutive_error_count", "INTEGER DEFAULT 0"),
    ];

    for (name, definition) in columns {
        let sql = format!("ALTER TABLE news_sources ADD COLUMN {} {}", name, definition);
        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => tracing::info!("Added column '{}' to news_sources", name),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    tracing::debug!("Column '{}' already present on news_sources", name);
                } else {
                    tracing::error!("Failed adding column '{}' to news_sources: {}", name, message);
                }
            },
        }
    }
}
