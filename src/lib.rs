//! Lantern Library
//!
//! News aggregation and analysis workbench core: storage, clustering, LLM
//! orchestration, and source health tracking.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::llm::{LLMConfigManager, LLMError, LLMService, OpenAiCompatLLMService};
pub use services::{
    AnalysisEngine, AnalysisStore, ArticleService, DataProcessor, EnhancedClusterer,
    HistoryService, SourceService, SourceStatusService,
};

/// Application shared state
///
/// Rust's type system is the DI container: services are constructed
/// leaves-first in main and shared through Arc.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,

    pub article_service: Arc<ArticleService>,
    pub source_service: Arc<SourceService>,
    pub history_service: Arc<HistoryService>,
    pub analysis_store: Arc<AnalysisStore>,

    pub config_manager: Arc<LLMConfigManager>,
    pub llm_service: Arc<OpenAiCompatLLMService>,

    pub data_processor: Arc<DataProcessor>,
    pub analysis_engine: Arc<AnalysisEngine>,
    pub source_status_service: Arc<SourceStatusService>,
}
