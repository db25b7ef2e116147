//! LLM service trait and its OpenAI-compatible implementation.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use super::client::LLMClient;
use super::config_manager::LLMConfigManager;
use super::models::{AnalysisItem, AnalysisPayload, ImportanceStance, LLMError, LlmProfile};
use super::prompts::{KIND_IMPORTANCE_STANCE, PromptManager};

/// The contract the analysis engine and the clusterer consume.
#[async_trait]
pub trait LLMService: Send + Sync {
    /// Whether an active profile with usable credentials is loaded
    fn is_configured(&self) -> bool;

    /// Free-form call; the reply is parsed JSON when the model returned
    /// JSON, else a JSON string carrying the raw text.
    async fn call_llm(&self, prompt: &str) -> Result<serde_json::Value, LLMError>;

    /// Single-item analysis under a kind tag
    async fn analyze_news(&self, item: &AnalysisItem, kind: &str)
    -> Result<AnalysisPayload, LLMError>;

    /// Cross-item similarity analysis
    async fn analyze_news_similarity(
        &self,
        items: &[AnalysisItem],
    ) -> Result<AnalysisPayload, LLMError>;

    /// Importance (0..10) and stance (-1..1) scores for one item
    async fn analyze_importance_stance(
        &self,
        item: &AnalysisItem,
    ) -> Result<ImportanceStance, LLMError>;

    /// Analysis with a caller-supplied prompt
    async fn analyze_with_custom_prompt(
        &self,
        items: &[AnalysisItem],
        prompt: &str,
    ) -> Result<AnalysisPayload, LLMError>;

    /// Probe connectivity of an arbitrary profile
    async fn test_connection_with_config(&self, profile: &LlmProfile) -> (bool, String);

    /// Re-read the active profile from the config manager
    async fn reload_active_config(&self) -> Result<(), LLMError>;

    fn prompt_manager(&self) -> &PromptManager;
}

/// Default implementation over the OpenAI-compatible chat client.
pub struct OpenAiCompatLLMService {
    config_manager: Arc<LLMConfigManager>,
    client: LLMClient,
    prompts: PromptManager,
    active: RwLock<Option<LlmProfile>>,
}

impl OpenAiCompatLLMService {
    pub fn new(config_manager: Arc<LLMConfigManager>) -> Self {
        Self {
            config_manager,
            client: LLMClient::new(),
            prompts: PromptManager::new(),
            active: RwLock::new(None),
        }
    }

    fn active_profile(&self) -> Result<LlmProfile, LLMError> {
        self.active
            .read()
            .expect("active profile lock poisoned")
            .clone()
            .ok_or(LLMError::NotConfigured)
    }

    fn items_digest(items: &[AnalysisItem]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "{}. {}（{}）\n{}",
                    i + 1,
                    item.title,
                    item.source,
                    truncate_chars(&item.content, 500)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Turn a raw model reply into the analysis payload, honoring JSON
    /// replies that carry their own fields.
    fn payload_from_value(value: serde_json::Value) -> AnalysisPayload {
        match value {
            serde_json::Value::String(text) => {
                AnalysisPayload { analysis: text, importance: None, stance: None }
            },
            serde_json::Value::Object(map) => {
                let analysis = map
                    .get("analysis")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        serde_json::Value::Object(map.clone()).to_string()
                    });
                AnalysisPayload {
                    analysis,
                    importance: map.get("importance").and_then(|v| v.as_f64()),
                    stance: map.get("stance").and_then(|v| v.as_f64()),
                }
            },
            other => AnalysisPayload { analysis: other.to_string(), importance: None, stance: None },
        }
    }
}

/// Parse a model reply: JSON object/array when possible (including fenced
/// ```json blocks), else the raw text as a JSON string.
pub fn parse_llm_reply(content: &str) -> serde_json::Value {
    let trimmed = content.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(candidate)
        .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl LLMService for OpenAiCompatLLMService {
    fn is_configured(&self) -> bool {
        self.active
            .read()
            .expect("active profile lock poisoned")
            .as_ref()
            .is_some_and(|p| p.has_credentials() && !p.model.is_empty())
    }

    async fn call_llm(&self, prompt: &str) -> Result<serde_json::Value, LLMError> {
        let profile = self.active_profile()?;
        let content = self
            .client
            .chat_completion(&profile, profile.system_prompt.as_deref(), prompt)
            .await?;
        Ok(parse_llm_reply(&content))
    }

    async fn analyze_news(
        &self,
        item: &AnalysisItem,
        kind: &str,
    ) -> Result<AnalysisPayload, LLMError> {
        let template = self.prompts.template_for_kind(kind);
        let prompt = PromptManager::render(
            template,
            &[
                ("kind", kind),
                ("title", &item.title),
                ("content", &truncate_chars(&item.content, 2000)),
            ],
        );
        let value = self.call_llm(&prompt).await?;
        Ok(Self::payload_from_value(value))
    }

    async fn analyze_news_similarity(
        &self,
        items: &[AnalysisItem],
    ) -> Result<AnalysisPayload, LLMError> {
        let template = self
            .prompts
            .get_template_content(super::prompts::KIND_SIMILARITY)
            .unwrap_or("对比分析以下新闻：\n{news}");
        let prompt = PromptManager::render(template, &[("news", &Self::items_digest(items))]);
        let value = self.call_llm(&prompt).await?;
        Ok(Self::payload_from_value(value))
    }

    async fn analyze_importance_stance(
        &self,
        item: &AnalysisItem,
    ) -> Result<ImportanceStance, LLMError> {
        let template = self
            .prompts
            .get_template_content(KIND_IMPORTANCE_STANCE)
            .unwrap_or("{title}\n{content}");
        let prompt = PromptManager::render(
            template,
            &[("title", &item.title), ("content", &truncate_chars(&item.content, 2000))],
        );
        let value = self.call_llm(&prompt).await?;

        let importance = value.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let stance = value.get("stance").and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(ImportanceStance { importance, stance })
    }

    async fn analyze_with_custom_prompt(
        &self,
        items: &[AnalysisItem],
        prompt: &str,
    ) -> Result<AnalysisPayload, LLMError> {
        let full_prompt = format!("{}\n\n新闻数据：\n{}", prompt, Self::items_digest(items));
        let value = self.call_llm(&full_prompt).await?;
        Ok(Self::payload_from_value(value))
    }

    async fn test_connection_with_config(&self, profile: &LlmProfile) -> (bool, String) {
        match self.client.test_connection(profile).await {
            Ok(()) => (true, "连接成功".to_string()),
            Err(e) => (false, format!("连接测试失败: {}", e)),
        }
    }

    async fn reload_active_config(&self) -> Result<(), LLMError> {
        let profile = self.config_manager.get_active_config().await?;
        match &profile {
            Some(p) => tracing::info!("LLM service reloaded active profile '{}'", p.name),
            None => tracing::info!("LLM service reloaded: no active profile"),
        }
        *self.active.write().expect("active profile lock poisoned") = profile;
        Ok(())
    }

    fn prompt_manager(&self) -> &PromptManager {
        &self.prompts
    }
}
