//! Façade between storage rows and the analysis/clustering layers:
//! loading, categorization, grouping, and analysis archival.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use serde::Serialize;

use crate::models::{Article, ArticleQuery, NewAnalysisRecord};
use crate::services::analysis_store::AnalysisStore;
use crate::services::article_service::ArticleService;
use crate::services::clusterer::categories::{
    STANDARD_CATEGORIES, category_name, categorize_by_keywords, detect_topics,
};
use crate::services::clusterer::{ClusterArticle, EnhancedClusterer, EventCluster};
use crate::services::llm::AnalysisItem;
use crate::utils::ApiResult;
use crate::utils::text::{char_set, jaccard};

/// Soft wall-clock budget for the pairwise title grouping.
const GROUPING_BUDGET_SECS: u64 = 60;

/// Output of [`DataProcessor::auto_group_news`]; the multi-feature method
/// returns full event clusters, the title heuristic plain article groups.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "groups")]
pub enum NewsGrouping {
    #[serde(rename = "title_similarity")]
    Groups(Vec<Vec<Article>>),
    #[serde(rename = "multi_feature")]
    Events(Vec<EventCluster>),
}

pub struct DataProcessor {
    articles: Arc<ArticleService>,
    analysis_store: Arc<AnalysisStore>,
    clusterer: Arc<EnhancedClusterer>,

    all_news_items: RwLock<Vec<Article>>,
    categorized_news: RwLock<HashMap<String, Vec<Article>>>,
    news_groups: RwLock<Vec<Vec<Article>>>,
}

impl DataProcessor {
    pub fn new(
        articles: Arc<ArticleService>,
        analysis_store: Arc<AnalysisStore>,
        clusterer: Arc<EnhancedClusterer>,
    ) -> Self {
        Self {
            articles,
            analysis_store,
            clusterer,
            all_news_items: RwLock::new(Vec::new()),
            categorized_news: RwLock::new(HashMap::new()),
            news_groups: RwLock::new(Vec::new()),
        }
    }

    /// Pull every article from storage and rebuild the category buckets.
    pub async fn load_news_data(&self) -> ApiResult<Vec<Article>> {
        tracing::info!("Loading news data from storage");

        let items = self.articles.list_articles(&ArticleQuery::default()).await?;
        if items.is_empty() {
            tracing::info!("No news data found");
            *self.all_news_items.write().await = Vec::new();
            *self.categorized_news.write().await = HashMap::new();
            return Ok(Vec::new());
        }

        tracing::info!("Loaded {} articles", items.len());

        let mut buckets: HashMap<String, Vec<Article>> = HashMap::new();
        for (id, _) in STANDARD_CATEGORIES {
            buckets.insert(id.to_string(), Vec::new());
        }
        buckets.insert("uncategorized".to_string(), Vec::new());

        for article in &items {
            let title = article.title.as_deref().unwrap_or("");
            let content = article.content.as_deref().unwrap_or("");
            let category = categorize_by_keywords(title, content);
            let bucket = if category == "general" { "uncategorized" } else { category };
            buckets
                .entry(bucket.to_string())
                .or_default()
                .push(article.clone());
        }

        for (category_id, bucket) in &buckets {
            if !bucket.is_empty() {
                tracing::info!(
                    "类别 '{}' 包含 {} 条新闻",
                    category_name(category_id),
                    bucket.len()
                );
            }
        }

        *self.all_news_items.write().await = items.clone();
        *self.categorized_news.write().await = buckets;
        Ok(items)
    }

    /// Articles in one category bucket; "all" returns the full snapshot.
    pub async fn get_news_by_category(&self, category_id: &str) -> Vec<Article> {
        if category_id == "all" {
            return self.all_news_items.read().await.clone();
        }
        self.categorized_news
            .read()
            .await
            .get(category_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_category_name(&self, category_id: &str) -> String {
        category_name(category_id)
    }

    /// Bucket display names for the given articles (by id membership).
    pub async fn get_news_categories(&self, items: &[Article]) -> Vec<String> {
        let buckets = self.categorized_news.read().await;
        let mut names = Vec::new();
        for article in items {
            for (category_id, bucket) in buckets.iter() {
                if bucket.iter().any(|a| a.id == article.id) {
                    names.push(category_name(category_id));
                    break;
                }
            }
        }
        names
    }

    /// Group related articles; `multi_feature` delegates to the clusterer,
    /// anything else runs the pairwise title heuristic.
    pub async fn auto_group_news(&self, items: &[Article], method: &str) -> ApiResult<NewsGrouping> {
        if items.is_empty() {
            tracing::warn!("没有可分组的新闻数据");
            return Ok(NewsGrouping::Groups(Vec::new()));
        }

        tracing::info!("Auto-grouping {} articles with method '{}'", items.len(), method);

        if method == "multi_feature" {
            let cluster_input: Vec<ClusterArticle> =
                items.iter().map(ClusterArticle::from).collect();
            let events = self.clusterer.cluster(&cluster_input).await;

            // retain the grouping snapshot as plain article groups
            let by_id: HashMap<i64, &Article> = items.iter().map(|a| (a.id, a)).collect();
            let groups: Vec<Vec<Article>> = events
                .iter()
                .map(|event| {
                    event
                        .reports
                        .iter()
                        .filter_map(|report| report.id.and_then(|id| by_id.get(&id)))
                        .map(|article| (*article).clone())
                        .collect()
                })
                .collect();
            *self.news_groups.write().await = groups;

            return Ok(NewsGrouping::Events(events));
        }

        let groups = Self::group_by_title_similarity(items);
        *self.news_groups.write().await = groups.clone();
        Ok(NewsGrouping::Groups(groups))
    }

    /// Pairwise title-similarity grouping. Cross-source only; groups of one
    /// are dropped; processing stops at the soft time budget with whatever
    /// was grouped so far.
    fn group_by_title_similarity(items: &[Article]) -> Vec<Vec<Article>> {
        struct TitleFeatures {
            title_lower: String,
            words: HashSet<String>,
            topics: HashSet<&'static str>,
            entities: HashSet<String>,
            numbers: HashSet<String>,
        }

        let features: Vec<TitleFeatures> = items
            .iter()
            .map(|article| {
                let title = article.title.as_deref().unwrap_or("");
                let title_lower = title.to_lowercase();
                TitleFeatures {
                    words: title_lower.split_whitespace().map(str::to_string).collect(),
                    topics: detect_topics(&title_lower),
                    entities: crate::utils::text::capitalized_tokens(title)
                        .into_iter()
                        .collect(),
                    numbers: crate::utils::text::digit_runs(&title_lower)
                        .into_iter()
                        .collect(),
                    title_lower,
                }
            })
            .collect();

        let start = Instant::now();
        let mut groups: Vec<Vec<Article>> = Vec::new();
        let mut processed: HashSet<usize> = HashSet::new();

        for i in 0..items.len() {
            if start.elapsed().as_secs() > GROUPING_BUDGET_SECS {
                tracing::warn!(
                    "自动分组处理时间超过{}秒，提前结束处理",
                    GROUPING_BUDGET_SECS
                );
                break;
            }
            if processed.contains(&i) || features[i].title_lower.is_empty() {
                continue;
            }

            let mut group = vec![items[i].clone()];
            let mut sources: HashSet<String> =
                [items[i].source_or_default().to_string()].into_iter().collect();
            processed.insert(i);

            for j in 0..items.len() {
                if i == j || processed.contains(&j) {
                    continue;
                }

                let other_source = items[j].source_or_default().to_string();
                if sources.contains(&other_source) {
                    continue; // same-source reports never merge
                }

                let fi = &features[i];
                let fj = &features[j];
                if fj.title_lower.is_empty() {
                    continue;
                }

                // disjoint explicit topics -> different stories
                if !fi.topics.is_empty()
                    && !fj.topics.is_empty()
                    && fi.topics.is_disjoint(&fj.topics)
                {
                    continue;
                }

                let common_words: HashSet<&String> = fi.words.intersection(&fj.words).collect();
                let keyword_similarity = if fi.words.is_empty() {
                    0.0
                } else {
                    common_words.len() as f64 / fi.words.len().max(1) as f64
                };

                let shared_entities = fi.entities.intersection(&fj.entities).count();
                let entity_match =
                    !fi.entities.is_empty() && !fj.entities.is_empty() && shared_entities > 0;

                // mismatched digit sets suggest different events unless the
                // entity overlap is strong
                if !fi.numbers.is_empty()
                    && !fj.numbers.is_empty()
                    && fi.numbers.is_disjoint(&fj.numbers)
                    && (!entity_match || shared_entities < 2)
                {
                    continue;
                }

                if keyword_similarity > 0.3
                    || common_words.len() >= 3
                    || (entity_match && shared_entities >= 2)
                {
                    let chars_i = char_set(&fi.title_lower);
                    let chars_j = char_set(&fj.title_lower);
                    let string_similarity = jaccard(&chars_i, &chars_j);

                    let mut semantic_similarity: f64 = 0.0;
                    if entity_match {
                        semantic_similarity += if shared_entities >= 3 {
                            0.4
                        } else if shared_entities >= 2 {
                            0.3
                        } else {
                            0.2
                        };
                    }
                    semantic_similarity += if common_words.len() >= 4 {
                        0.3
                    } else if common_words.len() >= 3 {
                        0.2
                    } else if common_words.len() >= 2 {
                        0.1
                    } else {
                        0.0
                    };

                    let score = 0.35 * keyword_similarity
                        + 0.25 * string_similarity
                        + 0.4 * semantic_similarity;

                    if score > 0.6
                        || (entity_match && keyword_similarity > 0.4)
                        || common_words.len() >= 5
                    {
                        group.push(items[j].clone());
                        sources.insert(other_source);
                        processed.insert(j);
                    }
                }
            }

            if group.len() > 1 {
                groups.push(group);
            }
        }

        tracing::info!(
            "自动分组处理完成，耗时 {:.2} 秒，处理了 {}/{} 条新闻",
            start.elapsed().as_secs_f64(),
            processed.len(),
            items.len()
        );
        groups
    }

    /// Project storage rows into the minimal shape LLM prompts consume.
    pub fn prepare_news_for_analysis(&self, items: &[Article]) -> Vec<AnalysisItem> {
        items
            .iter()
            .map(|article| AnalysisItem {
                title: article.title.clone().unwrap_or_default(),
                content: article.content.clone().unwrap_or_default(),
                source: article.source_or_default().to_string(),
                pub_date: article
                    .publish_time
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
                url: article.link.clone(),
            })
            .collect()
    }

    /// Archive an analysis result with its selection metadata; group info is
    /// attached when the current grouping intersects the selection.
    pub async fn save_analysis_result(
        &self,
        result: &str,
        analysis_type: &str,
        selected_news: &[Article],
    ) -> ApiResult<i64> {
        let mut titles: Vec<String> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        for article in selected_news {
            let title = article.title_or_default().to_string();
            if !titles.contains(&title) {
                titles.push(title);
            }
            let source = article.source_or_default().to_string();
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let mut categories: Vec<String> = Vec::new();
        for name in self.get_news_categories(selected_news).await {
            if !categories.contains(&name) {
                categories.push(name);
            }
        }

        let selected_ids: HashSet<i64> = selected_news.iter().map(|a| a.id).collect();
        let groups = self.news_groups.read().await;
        let group_info: Vec<serde_json::Value> = groups
            .iter()
            .filter(|group| group.iter().any(|a| selected_ids.contains(&a.id)))
            .map(|group| {
                let group_sources: Vec<String> = group
                    .iter()
                    .map(|a| a.source_or_default().to_string())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                serde_json::json!({
                    "title": group[0].title_or_default(),
                    "sources": group_sources,
                    "count": group.len(),
                })
            })
            .collect();
        drop(groups);

        let record = NewAnalysisRecord {
            analysis_type: analysis_type.to_string(),
            analysis_result_text: Some(result.to_string()),
            meta_news_count: Some(selected_news.len() as i64),
            meta_news_titles: titles,
            meta_news_sources: sources,
            meta_categories: categories,
            meta_groups: if group_info.is_empty() {
                None
            } else {
                Some(serde_json::Value::Array(group_info))
            },
            meta_article_ids: selected_news.iter().map(|a| a.id).collect(),
            meta_analysis_params: None,
            meta_error_info: None,
        };

        let article_ids: Vec<i64> = selected_news.iter().map(|a| a.id).collect();
        let id = self.analysis_store.add_analysis(&record, &article_ids).await?;
        tracing::info!("已保存分析结果到历史记录: {}", analysis_type);
        Ok(id)
    }
}
