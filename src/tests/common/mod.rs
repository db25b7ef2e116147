// Common test utilities and helpers

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::db;
use crate::models::{
    ArticleUpsert, CreateSourceRequest, NewsSource, SourceCheckOutcome, SourceType,
};
use crate::services::llm::{
    AnalysisItem, AnalysisPayload, ImportanceStance, LLMError, LLMService, LlmProfile,
    PromptManager,
};
use crate::services::source_status_service::SourceProbe;
use crate::utils::datetime::now_naive;

/// Create an in-memory SQLite database with the full schema applied.
pub async fn create_test_db() -> SqlitePool {
    let database = db::open("sqlite::memory:", None)
        .await
        .expect("Failed to create test database");
    assert!(database.just_created);
    database.pool
}

/// Minimal article payload with a unique link.
pub fn article(link: &str, title: &str) -> ArticleUpsert {
    ArticleUpsert {
        link: link.to_string(),
        title: Some(title.to_string()),
        content: Some(format!("{} 的详细内容。", title)),
        source_name: Some("测试来源".to_string()),
        ..Default::default()
    }
}

pub fn rss_source(name: &str, url: &str) -> CreateSourceRequest {
    CreateSourceRequest {
        name: name.to_string(),
        source_type: SourceType::Rss,
        url: Some(url.to_string()),
        category_name: None,
        is_enabled: true,
        is_user_added: true,
        custom_config: None,
        notes: None,
    }
}

// ============================================================================
// Mock LLM service
// ============================================================================

/// Scriptable LLM double: fixed responses, optional leading failures, and
/// call counters for interaction assertions.
pub struct MockLLMService {
    pub configured: bool,
    pub similarity: AnalysisPayload,
    pub single: AnalysisPayload,
    pub custom: AnalysisPayload,
    pub scores: ImportanceStance,
    pub call_llm_response: serde_json::Value,
    /// number of leading analyze_* calls that fail with a timeout
    failures_remaining: AtomicUsize,
    pub similarity_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
    pub scores_calls: AtomicUsize,
    pub custom_calls: AtomicUsize,
    pub reload_calls: AtomicUsize,
    prompts: PromptManager,
}

impl Default for MockLLMService {
    fn default() -> Self {
        Self {
            configured: true,
            similarity: AnalysisPayload {
                analysis: "similarity".to_string(),
                importance: None,
                stance: None,
            },
            single: AnalysisPayload {
                analysis: "single".to_string(),
                importance: None,
                stance: None,
            },
            custom: AnalysisPayload {
                analysis: "custom".to_string(),
                importance: None,
                stance: None,
            },
            scores: ImportanceStance { importance: 5.0, stance: 0.0 },
            call_llm_response: serde_json::Value::String("ok".to_string()),
            failures_remaining: AtomicUsize::new(0),
            similarity_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
            scores_calls: AtomicUsize::new(0),
            custom_calls: AtomicUsize::new(0),
            reload_calls: AtomicUsize::new(0),
            prompts: PromptManager::new(),
        }
    }
}

impl MockLLMService {
    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures_remaining = AtomicUsize::new(failures);
        self
    }

    fn maybe_fail(&self) -> Result<(), LLMError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(LLMError::Timeout(1));
        }
        Ok(())
    }
}

#[async_trait]
impl LLMService for MockLLMService {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn call_llm(&self, _prompt: &str) -> Result<serde_json::Value, LLMError> {
        Ok(self.call_llm_response.clone())
    }

    async fn analyze_news(
        &self,
        _item: &AnalysisItem,
        _kind: &str,
    ) -> Result<AnalysisPayload, LLMError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.single.clone())
    }

    async fn analyze_news_similarity(
        &self,
        _items: &[AnalysisItem],
    ) -> Result<AnalysisPayload, LLMError> {
        self.similarity_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.similarity.clone())
    }

    async fn analyze_importance_stance(
        &self,
        _item: &AnalysisItem,
    ) -> Result<ImportanceStance, LLMError> {
        self.scores_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.scores)
    }

    async fn analyze_with_custom_prompt(
        &self,
        _items: &[AnalysisItem],
        _prompt: &str,
    ) -> Result<AnalysisPayload, LLMError> {
        self.custom_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.custom.clone())
    }

    async fn test_connection_with_config(&self, _profile: &LlmProfile) -> (bool, String) {
        (true, "连接成功".to_string())
    }

    async fn reload_active_config(&self) -> Result<(), LLMError> {
        self.reload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn prompt_manager(&self) -> &PromptManager {
        &self.prompts
    }
}

// ============================================================================
// Mock source probe
// ============================================================================

/// Probe double that succeeds or fails per source name.
pub struct MockProbe {
    /// names that fail, with the failure message
    pub failures: Vec<(String, String)>,
    pub probes: AtomicUsize,
}

impl MockProbe {
    pub fn all_ok() -> Arc<Self> {
        Arc::new(Self { failures: Vec::new(), probes: AtomicUsize::new(0) })
    }

    pub fn failing(failures: Vec<(&str, &str)>) -> Arc<Self> {
        Arc::new(Self {
            failures: failures
                .into_iter()
                .map(|(name, message)| (name.to_string(), message.to_string()))
                .collect(),
            probes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceProbe for MockProbe {
    async fn probe(&self, source: &NewsSource) -> SourceCheckOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.failures.iter().find(|(name, _)| name == &source.name) {
            Some((_, message)) => SourceCheckOutcome {
                success: false,
                message: message.clone(),
                check_time: now_naive(),
            },
            None => SourceCheckOutcome {
                success: true,
                message: "OK".to_string(),
                check_time: now_naive(),
            },
        }
    }
}
