//! Analysis orchestration: preprocessing, LLM calls with retry, metadata
//! enrichment, and best-effort archival.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::models::Article;
use crate::services::data_processor::DataProcessor;
use crate::services::llm::prompts::KIND_IMPORTANCE_STANCE;
use crate::services::llm::{AnalysisItem, AnalysisPayload, LLMService};

/// Typed failure surface of the engine. The REST boundary converts these
/// into a `{"error": …}` body; the engine itself never swallows.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    DataProcessing(String),

    #[error("{0}")]
    LlmService(String),
}

/// Result contract of [`AnalysisEngine::analyze_news`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisOutput {
    pub analysis: String,
    /// Analysis text prefixed with a metadata header (type, count, titles)
    pub formatted_text: String,
    /// 0..10
    pub importance: f64,
    /// -1.0..1.0
    pub stance: f64,
    pub analysis_type: String,
    pub news_count: usize,
    /// ISO-8601
    pub timestamp: String,
}

pub struct AnalysisEngine {
    llm: Arc<dyn LLMService>,
    data_processor: Arc<DataProcessor>,
    max_retries: u32,
    retry_delay: Duration,
}

impl AnalysisEngine {
    pub fn new(llm: Arc<dyn LLMService>, data_processor: Arc<DataProcessor>) -> Self {
        Self { llm, data_processor, max_retries: 3, retry_delay: Duration::from_secs(1) }
    }

    /// Analyze a selection of articles under an analysis kind, optionally
    /// overridden by a caller-supplied prompt.
    pub async fn analyze_news(
        &self,
        news_items: &[Article],
        analysis_type: &str,
        custom_prompt: Option<&str>,
    ) -> Result<AnalysisOutput, AnalysisError> {
        if news_items.is_empty() {
            return Err(AnalysisError::DataProcessing("没有提供新闻数据".to_string()));
        }
        if !self.llm.is_configured() {
            return Err(AnalysisError::LlmService("LLM服务未初始化".to_string()));
        }

        tracing::info!("开始分析 {} 条新闻...", news_items.len());

        let processed = Self::preprocess(news_items)?;

        let payload = self
            .run_with_retry(&processed, analysis_type, custom_prompt)
            .await?;

        // postprocess: required keys with defaults
        let analysis = payload.analysis;
        let importance = payload.importance.unwrap_or(0.0);
        let stance = payload.stance.unwrap_or(0.0);
        let timestamp = Utc::now().to_rfc3339();

        let mut formatted_text = format!("分析类型: {}\n", analysis_type);
        formatted_text.push_str(&format!("新闻数量: {}\n", news_items.len()));
        formatted_text.push_str("\n分析的新闻:\n");
        for (i, article) in news_items.iter().enumerate() {
            formatted_text.push_str(&format!(
                "{}. {} ({})\n",
                i + 1,
                article.title_or_default(),
                article.source_or_default()
            ));
        }
        formatted_text.push_str("\n分析结果:\n");
        formatted_text.push_str(&analysis);

        // archival is best-effort and never blocks a successful result
        if let Err(e) = self
            .data_processor
            .save_analysis_result(&analysis, analysis_type, news_items)
            .await
        {
            tracing::error!("保存分析结果到历史记录时出错: {}", e);
        }

        Ok(AnalysisOutput {
            analysis,
            formatted_text,
            importance,
            stance,
            analysis_type: analysis_type.to_string(),
            news_count: news_items.len(),
            timestamp,
        })
    }

    /// Project articles into the prompt shape, silently skipping items with
    /// no usable text.
    fn preprocess(news_items: &[Article]) -> Result<Vec<AnalysisItem>, AnalysisError> {
        let mut processed = Vec::with_capacity(news_items.len());
        for article in news_items {
            let title = article.title.as_deref().unwrap_or("").trim().to_string();
            let content = article.content.as_deref().unwrap_or("").trim().to_string();
            if title.is_empty() && content.is_empty() {
                tracing::warn!("处理新闻项时出错，已跳过: link={}", article.link);
                continue;
            }
            processed.push(AnalysisItem {
                title,
                content,
                source: article.source_or_default().to_string(),
                pub_date: article
                    .publish_time
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
                url: article.link.clone(),
            });
        }

        if processed.is_empty() {
            return Err(AnalysisError::DataProcessing("所有新闻数据处理失败".to_string()));
        }
        Ok(processed)
    }

    async fn run_with_retry(
        &self,
        items: &[AnalysisItem],
        analysis_type: &str,
        custom_prompt: Option<&str>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        for attempt in 1..=self.max_retries {
            match self.run_once(items, analysis_type, custom_prompt).await {
                Ok(payload) => return Ok(payload),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        "分析失败，尝试重试 ({}/{}): {}",
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                },
                Err(e) => {
                    return Err(AnalysisError::LlmService(format!(
                        "分析失败，已达到最大重试次数: {}",
                        e
                    )));
                },
            }
        }
        unreachable!("retry loop always returns")
    }

    async fn run_once(
        &self,
        items: &[AnalysisItem],
        analysis_type: &str,
        custom_prompt: Option<&str>,
    ) -> Result<AnalysisPayload, crate::services::llm::LLMError> {
        if let Some(prompt) = custom_prompt {
            return self.llm.analyze_with_custom_prompt(items, prompt).await;
        }

        if items.len() > 1 {
            let mut payload = self.llm.analyze_news_similarity(items).await?;
            let scores = self.llm.analyze_importance_stance(&items[0]).await?;
            payload.importance = Some(scores.importance);
            payload.stance = Some(scores.stance);
            return Ok(payload);
        }

        let mut payload = self.llm.analyze_news(&items[0], analysis_type).await?;
        if analysis_type != KIND_IMPORTANCE_STANCE {
            let scores = self.llm.analyze_importance_stance(&items[0]).await?;
            payload.importance = Some(scores.importance);
            payload.stance = Some(scores.stance);
        }
        Ok(payload)
    }
}
