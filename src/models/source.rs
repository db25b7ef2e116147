use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::datetime::parse_db_datetime;

/// Kind of feed behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Rss,
    Crawler,
    Pengpai,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Crawler => "crawler",
            Self::Pengpai => "pengpai",
        }
    }

    pub fn parse_type(s: &str) -> Option<Self> {
        match s {
            "rss" => Some(Self::Rss),
            "crawler" => Some(Self::Crawler),
            "pengpai" => Some(Self::Pengpai),
            _ => None,
        }
    }
}

/// Health of a source as driven by the status-check lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceHealth {
    Unknown,
    Ok,
    Error,
    Checking,
}

impl SourceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Checking => "checking",
        }
    }

    pub fn parse_status(s: &str) -> Self {
        match s {
            "ok" => Self::Ok,
            "error" => Self::Error,
            "checking" => Self::Checking,
            _ => Self::Unknown,
        }
    }
}

/// A provider of articles (RSS feed or crawler target).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewsSource {
    pub id: i64,
    pub name: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub category_name: String,
    pub is_enabled: bool,
    pub is_user_added: bool,
    /// Free-form per-source configuration (e.g. CSS selectors for crawlers)
    #[schema(value_type = Option<Object>)]
    pub custom_config: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub last_checked_time: Option<NaiveDateTime>,
    pub status: SourceHealth,
    pub last_error: Option<String>,
    pub consecutive_error_count: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct NewsSourceRow {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub url: Option<String>,
    pub category_name: String,
    pub is_enabled: i64,
    pub is_user_added: i64,
    pub custom_config: Option<String>,
    pub notes: Option<String>,
    pub last_checked_time: Option<String>,
    pub status: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_error_count: Option<i64>,
}

impl From<NewsSourceRow> for NewsSource {
    fn from(row: NewsSourceRow) -> Self {
        let custom_config = row.custom_config.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| {
                    tracing::warn!("Unparsable custom_config for source '{}': {}", row.name, e);
                    e
                })
                .ok()
        });
        Self {
            id: row.id,
            name: row.name,
            source_type: SourceType::parse_type(&row.source_type).unwrap_or(SourceType::Rss),
            url: row.url,
            category_name: row.category_name,
            is_enabled: row.is_enabled != 0,
            is_user_added: row.is_user_added != 0,
            custom_config,
            notes: row.notes,
            last_checked_time: row
                .last_checked_time
                .as_deref()
                .and_then(|v| parse_db_datetime("last_checked_time", v)),
            status: row
                .status
                .as_deref()
                .map(SourceHealth::parse_status)
                .unwrap_or(SourceHealth::Unknown),
            last_error: row.last_error,
            consecutive_error_count: row.consecutive_error_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSourceRequest {
    pub name: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub category_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_true")]
    pub is_user_added: bool,
    #[schema(value_type = Option<Object>)]
    pub custom_config: Option<serde_json::Value>,
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Partial update for user edits; editing url or re-enabling a source resets
/// its health back to unknown.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateSourceRequest {
    pub url: Option<String>,
    pub category_name: Option<String>,
    pub is_enabled: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub custom_config: Option<serde_json::Value>,
    pub notes: Option<String>,
}

/// Status fields written back when a health-check probe completes.
#[derive(Debug, Clone)]
pub struct SourceStatusUpdate {
    pub status: SourceHealth,
    pub last_error: Option<String>,
    pub consecutive_error_count: i64,
    pub last_checked_time: NaiveDateTime,
}

/// Result of one fetch probe against a source.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceCheckOutcome {
    pub success: bool,
    pub message: String,
    #[schema(value_type = String)]
    pub check_time: NaiveDateTime,
}
