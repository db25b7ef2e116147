//! Article storage tests: upsert semantics, filters, read state.

use crate::models::{ArticleFilter, ArticleQuery, ArticleUpsert};
use crate::services::ArticleService;
use crate::tests::common::{article, create_test_db};
use crate::utils::datetime::parse_datetime;

#[tokio::test]
async fn upsert_assigns_id_and_round_trips() {
    let service = ArticleService::new(create_test_db().await);

    let id = service.upsert_article(&article("https://x/1", "T")).await.unwrap();
    assert!(id > 0);

    let fetched = service.get_article_by_link("https://x/1").await.unwrap().unwrap();
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.link, "https://x/1");
    assert_eq!(fetched.title.as_deref(), Some("T"));
    assert!(!fetched.is_read);
}

#[tokio::test]
async fn upsert_on_conflict_updates_in_place() {
    let service = ArticleService::new(create_test_db().await);

    let first = service.upsert_article(&article("https://x/1", "old")).await.unwrap();
    let before = service.get_article_by_link("https://x/1").await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let second = service.upsert_article(&article("https://x/1", "new")).await.unwrap();
    assert_eq!(first, second);

    let after = service.get_article_by_link("https://x/1").await.unwrap().unwrap();
    assert_eq!(after.title.as_deref(), Some("new"));
    // retrieval_time refreshed on every upsert
    assert!(after.retrieval_time >= before.retrieval_time);

    let count = service.count_articles(&ArticleFilter::default()).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn upsert_rejects_empty_link() {
    let service = ArticleService::new(create_test_db().await);
    let result = service.upsert_article(&article("", "T")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn publish_time_round_trips_through_storage() {
    let service = ArticleService::new(create_test_db().await);

    let mut item = article("https://x/1", "T");
    item.publish_time = parse_datetime("2024-05-01T08:30:00Z");
    service.upsert_article(&item).await.unwrap();

    let fetched = service.get_article_by_link("https://x/1").await.unwrap().unwrap();
    assert_eq!(fetched.publish_time, parse_datetime("2024-05-01T08:30:00Z"));
}

#[tokio::test]
async fn batch_upsert_skips_items_without_link() {
    let service = ArticleService::new(create_test_db().await);

    let batch = vec![
        article("https://x/1", "A"),
        article("", "skipped"),
        article("https://x/2", "B"),
    ];
    let affected = service.upsert_articles_batch(&batch).await.unwrap();
    assert_eq!(affected, 2);

    let count = service.count_articles(&ArticleFilter::default()).await.unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn read_status_flip_is_idempotent() {
    let service = ArticleService::new(create_test_db().await);
    service.upsert_article(&article("https://x/1", "T")).await.unwrap();

    for _ in 0..3 {
        assert!(service.set_read_status("https://x/1", true).await.unwrap());
    }

    let fetched = service.get_article_by_link("https://x/1").await.unwrap().unwrap();
    assert!(fetched.is_read);

    let read_count = service
        .count_articles(&ArticleFilter { is_read: Some(true), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(read_count, 1);
}

#[tokio::test]
async fn read_status_on_unknown_link_reports_false() {
    let service = ArticleService::new(create_test_db().await);
    assert!(!service.set_read_status("https://missing", true).await.unwrap());
}

#[tokio::test]
async fn list_filters_by_category_and_search_term() {
    let service = ArticleService::new(create_test_db().await);

    let mut tech = article("https://x/tech", "AI breakthrough announced");
    tech.category_name = Some("technology".to_string());
    tech.content = Some("large language models".to_string());
    service.upsert_article(&tech).await.unwrap();

    let mut sports = article("https://x/sports", "Final match tonight");
    sports.category_name = Some("sports".to_string());
    service.upsert_article(&sports).await.unwrap();

    let by_category = service
        .list_articles(&ArticleQuery {
            filter: ArticleFilter {
                category: Some("technology".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].link, "https://x/tech");

    let by_search = service
        .list_articles(&ArticleQuery {
            filter: ArticleFilter {
                search_term: Some("language models".to_string()),
                search_fields: Some(vec!["content".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0].link, "https://x/tech");
}

#[tokio::test]
async fn list_filters_by_ids() {
    let service = ArticleService::new(create_test_db().await);
    let a = service.upsert_article(&article("https://x/1", "A")).await.unwrap();
    let _b = service.upsert_article(&article("https://x/2", "B")).await.unwrap();

    let selected = service
        .list_articles(&ArticleQuery {
            filter: ArticleFilter { ids: Some(vec![a]), ..Default::default() },
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, a);
}

#[tokio::test]
async fn invalid_sort_column_falls_back_to_publish_time() {
    let service = ArticleService::new(create_test_db().await);

    let mut early = article("https://x/early", "early");
    early.publish_time = parse_datetime("2024-01-01T00:00:00Z");
    service.upsert_article(&early).await.unwrap();

    let mut late = article("https://x/late", "late");
    late.publish_time = parse_datetime("2024-06-01T00:00:00Z");
    service.upsert_article(&late).await.unwrap();

    let listed = service
        .list_articles(&ArticleQuery {
            sort_by: Some("malicious; DROP TABLE articles".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].link, "https://x/late");
}

#[tokio::test]
async fn get_articles_by_links_returns_matches() {
    let service = ArticleService::new(create_test_db().await);
    service.upsert_article(&article("https://x/1", "A")).await.unwrap();
    service.upsert_article(&article("https://x/2", "B")).await.unwrap();

    let found = service
        .get_articles_by_links(&[
            "https://x/1".to_string(),
            "https://missing".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].link, "https://x/1");
}

#[tokio::test]
async fn null_publish_time_housekeeping_removes_exactly_those_rows() {
    let service = ArticleService::new(create_test_db().await);

    let mut dated = article("https://x/dated", "dated");
    dated.publish_time = parse_datetime("2024-05-01T00:00:00Z");
    service.upsert_article(&dated).await.unwrap();

    service.upsert_article(&article("https://x/undated", "undated")).await.unwrap();

    let deleted = service.delete_articles_with_null_publish_time().await.unwrap();
    assert_eq!(deleted, 1);

    assert!(service.get_article_by_link("https://x/dated").await.unwrap().is_some());
    assert!(service.get_article_by_link("https://x/undated").await.unwrap().is_none());
}

#[tokio::test]
async fn lenient_timestamp_deserialization_accepts_trailing_z() {
    let raw = r#"{"link": "https://x/1", "publish_time": "2024-05-01T08:30:00Z"}"#;
    let parsed: ArticleUpsert = serde_json::from_str(raw).unwrap();
    assert!(parsed.publish_time.is_some());
}
