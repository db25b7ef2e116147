//! Analysis engine tests: validation, retry, merging, archival.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::models::Article;
use crate::services::clusterer::{ClustererOptions, EnhancedClusterer};
use crate::services::llm::{AnalysisPayload, ImportanceStance, LLMService};
use crate::services::{AnalysisEngine, AnalysisError, AnalysisStore, ArticleService, DataProcessor};
use crate::tests::common::{MockLLMService, article, create_test_db};

struct Fixture {
    llm: Arc<MockLLMService>,
    store: Arc<AnalysisStore>,
    engine: AnalysisEngine,
    articles: Arc<ArticleService>,
}

async fn build_engine(llm: MockLLMService) -> Fixture {
    let pool = create_test_db().await;
    let articles = Arc::new(ArticleService::new(pool.clone()));
    let store = Arc::new(AnalysisStore::new(pool));
    let clusterer = Arc::new(EnhancedClusterer::new(ClustererOptions::default()));
    let processor = Arc::new(DataProcessor::new(
        Arc::clone(&articles),
        Arc::clone(&store),
        clusterer,
    ));
    let llm = Arc::new(llm);
    let engine =
        AnalysisEngine::new(Arc::clone(&llm) as Arc<dyn LLMService>, processor);
    Fixture { llm, store, engine, articles }
}

async fn stored_articles(fixture: &Fixture, count: usize) -> Vec<Article> {
    let mut items = Vec::new();
    for i in 0..count {
        let link = format!("https://x/{}", i + 1);
        fixture
            .articles
            .upsert_article(&article(&link, &format!("标题{}", i + 1)))
            .await
            .unwrap();
        items.push(
            fixture
                .articles
                .get_article_by_link(&link)
                .await
                .unwrap()
                .unwrap(),
        );
    }
    items
}

#[tokio::test]
async fn empty_selection_is_a_data_processing_error() {
    let fixture = build_engine(MockLLMService::default()).await;
    let result = fixture.engine.analyze_news(&[], "摘要", None).await;
    match result {
        Err(AnalysisError::DataProcessing(message)) => {
            assert_eq!(message, "没有提供新闻数据");
        },
        other => panic!("expected DataProcessing error, got {:?}", other.map(|o| o.analysis)),
    }
}

#[tokio::test]
async fn unconfigured_llm_is_a_service_error() {
    let mut llm = MockLLMService::default();
    llm.configured = false;
    let fixture = build_engine(llm).await;
    let items = stored_articles(&fixture, 1).await;

    let result = fixture.engine.analyze_news(&items, "摘要", None).await;
    assert!(matches!(result, Err(AnalysisError::LlmService(_))));
}

#[tokio::test]
async fn similarity_analysis_merges_first_item_scores() {
    let mut llm = MockLLMService::default();
    llm.similarity = AnalysisPayload { analysis: "S".to_string(), importance: None, stance: None };
    llm.scores = ImportanceStance { importance: 0.8, stance: -0.5 };
    let fixture = build_engine(llm).await;
    let items = stored_articles(&fixture, 2).await;

    let output = fixture
        .engine
        .analyze_news(&items, "新闻相似度分析", None)
        .await
        .unwrap();

    assert_eq!(output.analysis, "S");
    assert_eq!(output.importance, 0.8);
    assert_eq!(output.stance, -0.5);
    assert_eq!(output.analysis_type, "新闻相似度分析");
    assert_eq!(output.news_count, 2);
    assert!(output.formatted_text.contains("分析类型: 新闻相似度分析"));
    assert!(output.formatted_text.contains("标题1"));
    assert!(output.formatted_text.contains("标题2"));

    assert_eq!(fixture.llm.similarity_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.llm.scores_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_item_importance_kind_skips_the_extra_score_call() {
    let mut llm = MockLLMService::default();
    llm.single = AnalysisPayload {
        analysis: "立场分析".to_string(),
        importance: Some(7.0),
        stance: Some(0.4),
    };
    let fixture = build_engine(llm).await;
    let items = stored_articles(&fixture, 1).await;

    let output = fixture
        .engine
        .analyze_news(&items, "重要程度和立场分析", None)
        .await
        .unwrap();

    assert_eq!(output.importance, 7.0);
    assert_eq!(output.stance, 0.4);
    assert_eq!(fixture.llm.scores_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_item_other_kinds_add_the_score_call() {
    let fixture = build_engine(MockLLMService::default()).await;
    let items = stored_articles(&fixture, 1).await;

    let output = fixture.engine.analyze_news(&items, "深度分析", None).await.unwrap();
    assert_eq!(output.analysis, "single");
    assert_eq!(output.importance, 5.0);
    assert_eq!(fixture.llm.single_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.llm.scores_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn custom_prompt_supersedes_the_kind() {
    let fixture = build_engine(MockLLMService::default()).await;
    let items = stored_articles(&fixture, 2).await;

    let output = fixture
        .engine
        .analyze_news(&items, "新闻相似度分析", Some("只总结共同点"))
        .await
        .unwrap();

    assert_eq!(output.analysis, "custom");
    assert_eq!(fixture.llm.custom_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.llm.similarity_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transient_failures_are_retried_up_to_three_attempts() {
    let llm = MockLLMService::default().failing_first(2);
    let fixture = build_engine(llm).await;
    let items = stored_articles(&fixture, 2).await;

    let output = fixture
        .engine
        .analyze_news(&items, "新闻相似度分析", None)
        .await
        .unwrap();
    assert_eq!(output.analysis, "similarity");
    // two failed attempts plus the successful third
    assert_eq!(fixture.llm.similarity_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_as_a_service_error() {
    let llm = MockLLMService::default().failing_first(10);
    let fixture = build_engine(llm).await;
    let items = stored_articles(&fixture, 2).await;

    let result = fixture
        .engine
        .analyze_news(&items, "新闻相似度分析", None)
        .await;
    match result {
        Err(AnalysisError::LlmService(message)) => {
            assert!(message.contains("已达到最大重试次数"));
        },
        other => panic!("expected LlmService error, got {:?}", other.map(|o| o.analysis)),
    }
    assert_eq!(fixture.llm.similarity_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn successful_analyses_are_archived() {
    let fixture = build_engine(MockLLMService::default()).await;
    let items = stored_articles(&fixture, 2).await;

    fixture
        .engine
        .analyze_news(&items, "新闻相似度分析", None)
        .await
        .unwrap();

    let linked = fixture
        .store
        .get_analyses_for_article(items[0].id)
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].analysis_type, "新闻相似度分析");
    assert_eq!(linked[0].analysis_result_text.as_deref(), Some("similarity"));
}

#[tokio::test]
async fn unknown_kinds_pass_straight_through() {
    let fixture = build_engine(MockLLMService::default()).await;
    let items = stored_articles(&fixture, 1).await;

    let output = fixture
        .engine
        .analyze_news(&items, "完全自定义的标签", None)
        .await
        .unwrap();
    assert_eq!(output.analysis_type, "完全自定义的标签");
}
