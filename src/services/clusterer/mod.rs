//! Multi-feature event clustering.
//!
//! Articles are fused over five similarity channels (title/content TF-IDF,
//! entities, topics, time proximity), coarse-grouped hierarchically, refined
//! with DBSCAN, and assembled into event clusters. An optional LLM service
//! upgrades entity extraction, summaries, keywords, and categorization; all
//! of those have deterministic rule-based fallbacks.

pub mod algorithms;
pub mod categories;
pub mod features;

use chrono::NaiveDateTime;
use dashmap::DashMap;
use ndarray::Array2;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::Article;
use crate::services::llm::{LLMService, PromptManager};
use crate::utils::datetime::now_naive;
use crate::utils::text::clean_text;

use algorithms::{agglomerative_average, dbscan_precomputed};
use features::{
    CountVectorizer, LatentDirichletAllocation, TfidfVectorizer, cosine_similarity_matrix,
    entity_similarity_matrix, mean_similarity, simple_entities, time_proximity_matrix,
    topic_similarity_matrix,
};

/// Seed of the topic model. Fixed so repeated runs agree.
const LDA_SEED: u64 = 42;

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct FeatureWeights {
    pub title_tfidf: f64,
    pub content_tfidf: f64,
    pub entity: f64,
    pub topic: f64,
    pub time_proximity: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            title_tfidf: 0.3,
            content_tfidf: 0.2,
            entity: 0.25,
            topic: 0.15,
            time_proximity: 0.1,
        }
    }
}

impl FeatureWeights {
    fn total(&self) -> f64 {
        self.title_tfidf + self.content_tfidf + self.entity + self.topic + self.time_proximity
    }

    /// Scale so the weights sum to 1.
    pub fn normalized(mut self) -> Self {
        let total = self.total();
        if total > 0.0 {
            self.title_tfidf /= total;
            self.content_tfidf /= total;
            self.entity /= total;
            self.topic /= total;
            self.time_proximity /= total;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ClustererOptions {
    /// DBSCAN neighborhood radius on distance = 1 - similarity
    pub eps: f64,
    /// DBSCAN minimum cluster size
    pub min_samples: usize,
    /// Coarse grouping stops at distance 1 - similarity_threshold
    pub similarity_threshold: f64,
    /// Scale (days) of the Gaussian time-proximity kernel
    pub time_window_days: f64,
    pub weights: FeatureWeights,
    /// LDA topic count
    pub n_topics: usize,
}

impl Default for ClustererOptions {
    fn default() -> Self {
        Self {
            eps: 0.4,
            min_samples: 2,
            similarity_threshold: 0.5,
            time_window_days: 3.0,
            weights: FeatureWeights::default(),
            n_topics: 20,
        }
    }
}

// ============================================================================
// Input / output shapes
// ============================================================================

/// Article projection consumed by the clusterer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClusterArticle {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub source_name: String,
    pub publish_time: Option<NaiveDateTime>,
}

impl From<&Article> for ClusterArticle {
    fn from(article: &Article) -> Self {
        Self {
            id: Some(article.id),
            title: article.title.clone().unwrap_or_default(),
            content: article.content.clone().unwrap_or_default(),
            source_name: article.source_or_default().to_string(),
            publish_time: article.publish_time,
        }
    }
}

/// A group of articles covering the same real-world event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventCluster {
    pub event_id: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub reports: Vec<ClusterArticle>,
    pub sources: Vec<String>,
    pub publish_time: NaiveDateTime,
}

#[derive(Debug, Clone)]
struct PreparedArticle {
    article: ClusterArticle,
    clean_title: String,
    clean_content: String,
    publish_time: NaiveDateTime,
}

// ============================================================================
// Clusterer
// ============================================================================

pub struct EnhancedClusterer {
    options: ClustererOptions,
    llm: Option<Arc<dyn LLMService>>,
    prompts: PromptManager,
    entity_cache: DashMap<i64, Vec<String>>,
}

impl EnhancedClusterer {
    pub fn new(options: ClustererOptions) -> Self {
        Self {
            options: ClustererOptions {
                weights: options.weights.normalized(),
                ..options
            },
            llm: None,
            prompts: PromptManager::new(),
            entity_cache: DashMap::new(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLMService>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn options(&self) -> &ClustererOptions {
        &self.options
    }

    fn llm_if_configured(&self) -> Option<&Arc<dyn LLMService>> {
        self.llm.as_ref().filter(|llm| llm.is_configured())
    }

    /// Group articles into event clusters, largest events first.
    pub async fn cluster(&self, news: &[ClusterArticle]) -> Vec<EventCluster> {
        if news.is_empty() {
            tracing::warn!("Empty article list, nothing to cluster");
            return Vec::new();
        }

        tracing::info!("Clustering {} articles", news.len());

        let prepared = Self::preprocess(news);
        let similarity = self.fused_similarity(&prepared).await;
        let distance = similarity.mapv(|s| (1.0 - s).max(0.0));

        let coarse =
            agglomerative_average(&distance, 1.0 - self.options.similarity_threshold);

        let mut events: Vec<EventCluster> = Vec::new();
        for group in coarse {
            if group.len() == 1 {
                let event = self
                    .assemble_event(&prepared, &[group[0]], &similarity, events.len())
                    .await;
                events.push(event);
                continue;
            }

            // DBSCAN over the coarse group's sub-matrix; noise points become
            // singleton events
            let m = group.len();
            let mut sub = Array2::zeros((m, m));
            for (a, &i) in group.iter().enumerate() {
                for (b, &j) in group.iter().enumerate() {
                    sub[[a, b]] = distance[[i, j]];
                }
            }
            let labels = dbscan_precomputed(&sub, self.options.eps, self.options.min_samples);

            let mut fine: HashMap<i64, Vec<usize>> = HashMap::new();
            for (position, &label) in labels.iter().enumerate() {
                if label == -1 {
                    let event = self
                        .assemble_event(&prepared, &[group[position]], &similarity, events.len())
                        .await;
                    events.push(event);
                } else {
                    fine.entry(label).or_default().push(group[position]);
                }
            }

            let mut fine: Vec<(i64, Vec<usize>)> = fine.into_iter().collect();
            fine.sort_by_key(|(label, _)| *label);
            for (_, members) in fine {
                let event = self
                    .assemble_event(&prepared, &members, &similarity, events.len())
                    .await;
                events.push(event);
            }
        }

        events.sort_by(|a, b| b.reports.len().cmp(&a.reports.len()));
        tracing::info!("Clustering produced {} event groups", events.len());
        events
    }

    /// Categorize one article: LLM when available, keyword table otherwise.
    pub async fn categorize_article(&self, title: &str, content: &str) -> String {
        if let Some(llm) = self.llm_if_configured() {
            let categories_digest = categories::STANDARD_CATEGORIES
                .iter()
                .map(|(id, name)| format!("{}({})", id, name))
                .collect::<Vec<_>>()
                .join(", ");
            let template = self
                .prompts
                .get_template_content("categorize")
                .unwrap_or("{categories}\n{title}\n{content}");
            let prompt = PromptManager::render(
                template,
                &[
                    ("categories", categories_digest.as_str()),
                    ("title", title),
                    ("content", &head_chars(content, 500)),
                ],
            );

            match llm.call_llm(&prompt).await {
                Ok(value) => {
                    if let Some(category) = value.get("category").and_then(|v| v.as_str())
                        && categories::STANDARD_CATEGORIES.iter().any(|(id, _)| *id == category)
                    {
                        return category.to_string();
                    }
                },
                Err(e) => tracing::error!("分类新闻出错: {}", e),
            }
        }

        categories::categorize_by_keywords(title, content).to_string()
    }

    /// Extract up to five keywords for one article.
    pub async fn extract_keywords(&self, title: &str, content: &str) -> Vec<String> {
        if let Some(llm) = self.llm_if_configured() {
            let template = self
                .prompts
                .get_template_content("keyword_extraction")
                .unwrap_or("{title}\n{content}");
            let prompt = PromptManager::render(
                template,
                &[("title", title), ("content", &head_chars(content, 500))],
            );

            match llm.call_llm(&prompt).await {
                Ok(value) => {
                    if let Some(keywords) = value.get("keywords").and_then(|v| v.as_array()) {
                        let keywords: Vec<String> = keywords
                            .iter()
                            .filter_map(|k| k.as_str())
                            .map(str::to_string)
                            .take(5)
                            .collect();
                        if !keywords.is_empty() {
                            return keywords;
                        }
                    }
                },
                Err(e) => tracing::error!("提取关键词出错: {}", e),
            }
        }

        categories::extract_title_keywords(title)
    }

    /// Short summary of one article: LLM first, sentence-aware truncation of
    /// the content otherwise, title as the last resort.
    pub async fn generate_summary(&self, title: &str, content: &str) -> String {
        if let Some(llm) = self.llm_if_configured() {
            let template = self
                .prompts
                .get_template_content("摘要")
                .unwrap_or("{title}\n{content}");
            let prompt = PromptManager::render(
                template,
                &[("title", title), ("content", &head_chars(content, 500))],
            );

            match llm.call_llm(&prompt).await {
                Ok(serde_json::Value::String(summary)) if !summary.trim().is_empty() => {
                    return summary.trim().to_string();
                },
                Ok(_) => {},
                Err(e) => tracing::error!("生成摘要出错: {}", e),
            }
        }

        summarize_content(title, content)
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn preprocess(news: &[ClusterArticle]) -> Vec<PreparedArticle> {
        news.iter()
            .map(|article| PreparedArticle {
                clean_title: clean_text(&article.title),
                clean_content: clean_text(&article.content),
                publish_time: article.publish_time.unwrap_or_else(now_naive),
                article: article.clone(),
            })
            .collect()
    }

    async fn fused_similarity(&self, prepared: &[PreparedArticle]) -> Array2<f64> {
        let titles: Vec<String> = prepared.iter().map(|p| p.clean_title.clone()).collect();
        let contents: Vec<String> = prepared.iter().map(|p| p.clean_content.clone()).collect();
        let combined: Vec<String> = prepared
            .iter()
            .map(|p| format!("{} {}", p.clean_title, p.clean_content))
            .collect();
        let times: Vec<NaiveDateTime> = prepared.iter().map(|p| p.publish_time).collect();

        let title_sim =
            cosine_similarity_matrix(&TfidfVectorizer::new(1000).fit_transform(&titles));
        let content_sim =
            cosine_similarity_matrix(&TfidfVectorizer::new(2000).fit_transform(&contents));

        let entity_sets = self.entity_sets(prepared).await;
        let entity_sim = entity_similarity_matrix(&entity_sets);

        let counts = CountVectorizer::new(1000).fit_transform(&combined);
        let doc_topics =
            LatentDirichletAllocation::new(self.options.n_topics, LDA_SEED).fit_transform(&counts);
        let topic_sim = topic_similarity_matrix(&doc_topics);

        let time_sim = time_proximity_matrix(&times, self.options.time_window_days);

        let w = &self.options.weights;
        let mut fused = Array2::zeros((prepared.len(), prepared.len()));
        for i in 0..prepared.len() {
            for j in 0..prepared.len() {
                fused[[i, j]] = w.title_tfidf * title_sim[[i, j]]
                    + w.content_tfidf * content_sim[[i, j]]
                    + w.entity * entity_sim[[i, j]]
                    + w.topic * topic_sim[[i, j]]
                    + w.time_proximity * time_sim[[i, j]];
            }
        }
        fused
    }

    async fn entity_sets(&self, prepared: &[PreparedArticle]) -> Vec<HashSet<String>> {
        let mut sets = Vec::with_capacity(prepared.len());

        if let Some(llm) = self.llm_if_configured() {
            for item in prepared {
                let entities = self.llm_entities(llm, item).await;
                sets.push(entities);
            }
        } else {
            for item in prepared {
                sets.push(
                    simple_entities(&item.clean_title, &item.clean_content)
                        .into_iter()
                        .collect(),
                );
            }
        }

        sets
    }

    async fn llm_entities(
        &self,
        llm: &Arc<dyn LLMService>,
        item: &PreparedArticle,
    ) -> HashSet<String> {
        if let Some(id) = item.article.id
            && let Some(cached) = self.entity_cache.get(&id)
        {
            return cached.iter().cloned().collect();
        }

        let template = self
            .prompts
            .get_template_content("entity_extraction")
            .unwrap_or("{title}\n{content}");
        let prompt = PromptManager::render(
            template,
            &[
                ("title", item.clean_title.as_str()),
                ("content", &head_chars(&item.clean_content, 500)),
            ],
        );

        let entities: Vec<String> = match llm.call_llm(&prompt).await {
            Ok(value) => value
                .get("entities")
                .and_then(|v| v.as_array())
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|e| e.get("text").and_then(|t| t.as_str()))
                        .map(|t| t.to_lowercase())
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::error!("实体识别出错: {}", e);
                Vec::new()
            },
        };

        if let Some(id) = item.article.id {
            self.entity_cache.insert(id, entities.clone());
        }

        entities.into_iter().collect()
    }

    async fn assemble_event(
        &self,
        prepared: &[PreparedArticle],
        members: &[usize],
        similarity: &Array2<f64>,
        event_index: usize,
    ) -> EventCluster {
        // representative = member with the highest average intra-cluster
        // similarity
        let representative = members
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let sim_a = mean_similarity(similarity, a, members, a);
                let sim_b = mean_similarity(similarity, b, members, b);
                sim_a.partial_cmp(&sim_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(members[0]);
        let rep = &prepared[representative];

        let keywords = self.cluster_keywords(prepared, members).await;
        let category = self.cluster_category(prepared, members).await;
        let summary = self
            .generate_summary(&rep.article.title, &rep.article.content)
            .await;

        let mut sources = Vec::new();
        for &index in members {
            let source = prepared[index].article.source_name.clone();
            let source = if source.is_empty() { "未知来源".to_string() } else { source };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let publish_time = members
            .iter()
            .map(|&index| prepared[index].publish_time)
            .min()
            .unwrap_or_else(now_naive);

        let title = if rep.article.title.is_empty() {
            "无标题".to_string()
        } else {
            rep.article.title.clone()
        };

        EventCluster {
            event_id: format!("event_{}", event_index),
            title,
            summary,
            keywords,
            category,
            reports: members.iter().map(|&index| prepared[index].article.clone()).collect(),
            sources,
            publish_time,
        }
    }

    /// Top-5 keywords by frequency across the member articles.
    async fn cluster_keywords(
        &self,
        prepared: &[PreparedArticle],
        members: &[usize],
    ) -> Vec<String> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for &index in members {
            let item = &prepared[index];
            for keyword in self.extract_keywords(&item.article.title, &item.article.content).await {
                match counts.iter_mut().find(|(k, _)| *k == keyword) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((keyword, 1)),
                }
            }
        }
        // stable: count desc, first-seen order for ties
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().take(5).map(|(keyword, _)| keyword).collect()
    }

    /// Majority vote over the member categorizations.
    async fn cluster_category(&self, prepared: &[PreparedArticle], members: &[usize]) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for &index in members {
            let item = &prepared[index];
            let category = self
                .categorize_article(&item.article.title, &item.article.content)
                .await;
            match counts.iter_mut().find(|(c, _)| *c == category) {
                Some((_, count)) => *count += 1,
                None => counts.push((category, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .next()
            .map(|(category, _)| category)
            .unwrap_or_else(|| "general".to_string())
    }
}

/// First ~200 characters of the content, extended to the nearest sentence
/// terminator within the next 100 characters; falls back to the title.
fn summarize_content(title: &str, content: &str) -> String {
    if content.is_empty() {
        return if title.is_empty() { "无摘要".to_string() } else { title.to_string() };
    }

    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= 200 {
        return content.to_string();
    }

    let terminators = ['。', '？', '！', '.', '?', '!'];
    let end = chars.len().min(300);
    for i in 200..end {
        if terminators.contains(&chars[i]) {
            return chars[..=i].iter().collect();
        }
    }

    let mut truncated: String = chars[..200].iter().collect();
    truncated.push_str("...");
    truncated
}

fn head_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
