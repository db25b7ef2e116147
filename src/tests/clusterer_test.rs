//! Multi-feature clusterer tests: determinism, coverage, event assembly.

use crate::services::clusterer::{ClusterArticle, ClustererOptions, EnhancedClusterer};
use crate::utils::datetime::parse_datetime;

fn cn_article(id: i64, title: &str, content: &str, source: &str) -> ClusterArticle {
    ClusterArticle {
        id: Some(id),
        title: title.to_string(),
        content: content.to_string(),
        source_name: source.to_string(),
        publish_time: parse_datetime("2024-05-01T09:00:00Z"),
    }
}

/// Three same-day economy stories from different outlets plus one sports
/// story.
fn economy_plus_sports() -> Vec<ClusterArticle> {
    // the three economy stories carry the same wire copy
    let economy_copy = "中国宣布新一轮经济政策改革，央行与财政部门协同推进金融市场开放，\
                        经济增长目标保持稳定，金融监管与市场准入同步调整，经济结构改革持续深化，\
                        多家机构预计市场流动性将保持合理充裕，改革细则将于近期公布。";
    vec![
        cn_article(1, "中国经济政策改革", economy_copy, "新华社"),
        cn_article(2, "中国经济新政策出台", economy_copy, "财新"),
        cn_article(3, "央行发布新经济指引", economy_copy, "路透中文"),
        cn_article(
            4,
            "本地足球联赛开幕",
            "本地足球联赛昨晚正式开幕，多支球队展开首轮比赛，球迷热情高涨，主场观众爆满。",
            "体坛周报",
        ),
    ]
}

#[tokio::test]
async fn related_stories_cluster_apart_from_unrelated() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let events = clusterer.cluster(&economy_plus_sports()).await;

    assert_eq!(events.len(), 2);

    // sorted by report count descending
    let economy = &events[0];
    assert_eq!(economy.reports.len(), 3);
    assert_eq!(economy.category, "business");
    assert!(economy.keywords.iter().any(|k| k.contains("经济")));
    assert_eq!(economy.sources.len(), 3);

    let sports = &events[1];
    assert_eq!(sports.reports.len(), 1);
    assert_eq!(sports.reports[0].id, Some(4));
}

#[tokio::test]
async fn every_article_lands_in_exactly_one_event() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let input = economy_plus_sports();
    let events = clusterer.cluster(&input).await;

    let mut seen: Vec<i64> = events
        .iter()
        .flat_map(|e| e.reports.iter().filter_map(|r| r.id))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn clustering_is_deterministic_without_llm() {
    let input = economy_plus_sports();

    let first = EnhancedClusterer::new(ClustererOptions::default())
        .cluster(&input)
        .await;
    let second = EnhancedClusterer::new(ClustererOptions::default())
        .cluster(&input)
        .await;

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.title, b.title);
        assert_eq!(a.category, b.category);
        assert_eq!(a.keywords, b.keywords);
        let ids_a: Vec<Option<i64>> = a.reports.iter().map(|r| r.id).collect();
        let ids_b: Vec<Option<i64>> = b.reports.iter().map(|r| r.id).collect();
        assert_eq!(ids_a, ids_b);
    }
}

#[tokio::test]
async fn missing_publish_time_defaults_to_now() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let mut input = economy_plus_sports();
    input[0].publish_time = None;

    let events = clusterer.cluster(&input).await;
    let total: usize = events.iter().map(|e| e.reports.len()).sum();
    assert_eq!(total, 4);
    for event in &events {
        // assembled events always carry a concrete publish time
        assert!(event.publish_time.and_utc().timestamp() > 0);
    }
}

#[tokio::test]
async fn single_article_becomes_a_singleton_event() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let input = vec![economy_plus_sports().remove(3)];

    let events = clusterer.cluster(&input).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, "event_0");
    assert_eq!(events[0].title, "本地足球联赛开幕");
    assert!(!events[0].summary.is_empty());
}

#[tokio::test]
async fn empty_input_clusters_to_nothing() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    assert!(clusterer.cluster(&[]).await.is_empty());
}

#[tokio::test]
async fn event_publish_time_is_earliest_report() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let mut input = economy_plus_sports();
    input[1].publish_time = parse_datetime("2024-05-01T06:00:00Z");

    let events = clusterer.cluster(&input).await;
    let economy = events.iter().find(|e| e.reports.len() == 3).expect("economy event");
    assert_eq!(economy.publish_time, parse_datetime("2024-05-01T06:00:00Z").unwrap());
}

#[tokio::test]
async fn html_is_stripped_before_similarity() {
    let clusterer = EnhancedClusterer::new(ClustererOptions::default());
    let input = vec![
        cn_article(1, "<b>中国经济政策改革</b>", "<p>经济 政策 改革 金融</p>", "A"),
        cn_article(2, "中国经济新政策出台", "经济 政策 金融 市场", "B"),
    ];

    let events = clusterer.cluster(&input).await;
    // titles keep their original (unstripped) text in reports
    let total: usize = events.iter().map(|e| e.reports.len()).sum();
    assert_eq!(total, 2);
}
