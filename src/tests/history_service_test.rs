//! Browsing history tests: FK enforcement, joined reads, retention.

use crate::services::{ArticleService, HistoryService};
use crate::tests::common::{article, create_test_db};
use crate::utils::datetime::now_naive;

#[tokio::test]
async fn entries_require_an_existing_article() {
    let pool = create_test_db().await;
    let history = HistoryService::new(pool.clone());

    let result = history.add_entry(4242, None).await;
    assert!(result.is_err());

    let entries = history.list_entries(None, None, None).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn entries_come_back_joined_and_newest_first() {
    let pool = create_test_db().await;
    let articles = ArticleService::new(pool.clone());
    let history = HistoryService::new(pool);

    let first = articles.upsert_article(&article("https://x/1", "一")).await.unwrap();
    let second = articles.upsert_article(&article("https://x/2", "二")).await.unwrap();

    let early = now_naive() - chrono::Duration::hours(2);
    history.add_entry(first, Some(early)).await.unwrap();
    history.add_entry(second, None).await.unwrap();

    let entries = history.list_entries(None, None, None).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].article_id, second);
    assert_eq!(entries[0].title.as_deref(), Some("二"));
    assert_eq!(entries[1].article_id, first);
}

#[tokio::test]
async fn days_limit_cuts_off_old_views() {
    let pool = create_test_db().await;
    let articles = ArticleService::new(pool.clone());
    let history = HistoryService::new(pool);

    let id = articles.upsert_article(&article("https://x/1", "T")).await.unwrap();
    history
        .add_entry(id, Some(now_naive() - chrono::Duration::days(10)))
        .await
        .unwrap();
    history.add_entry(id, None).await.unwrap();

    let recent = history.list_entries(Some(7), None, None).await.unwrap();
    assert_eq!(recent.len(), 1);

    let all = history.list_entries(None, None, None).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn entries_cascade_away_with_their_article() {
    let pool = create_test_db().await;
    let articles = ArticleService::new(pool.clone());
    let history = HistoryService::new(pool.clone());

    let id = articles.upsert_article(&article("https://x/1", "T")).await.unwrap();
    history.add_entry(id, None).await.unwrap();

    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let entries = history.list_entries(None, None, None).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn delete_and_clear_remove_entries() {
    let pool = create_test_db().await;
    let articles = ArticleService::new(pool.clone());
    let history = HistoryService::new(pool);

    let id = articles.upsert_article(&article("https://x/1", "T")).await.unwrap();
    let entry = history.add_entry(id, None).await.unwrap();
    history.add_entry(id, None).await.unwrap();

    assert!(history.delete_entry(entry).await.unwrap());
    assert!(!history.delete_entry(entry).await.unwrap());

    let cleared = history.clear().await.unwrap();
    assert_eq!(cleared, 1);
    assert!(history.list_entries(None, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn latest_entry_tracks_most_recent_view() {
    let pool = create_test_db().await;
    let articles = ArticleService::new(pool.clone());
    let history = HistoryService::new(pool);

    let id = articles.upsert_article(&article("https://x/1", "T")).await.unwrap();
    assert!(history.latest_entry_for_article(id).await.unwrap().is_none());

    history
        .add_entry(id, Some(now_naive() - chrono::Duration::hours(1)))
        .await
        .unwrap();
    let newest = history.add_entry(id, None).await.unwrap();

    let latest = history.latest_entry_for_article(id).await.unwrap().unwrap();
    assert_eq!(latest.id, newest);
}
