//! OPML gateway contract test.
//!
//! Document parsing lives outside the core; the gateway trait is exercised
//! with an in-memory double to pin down the exchange semantics: export all
//! sources, re-import into an empty registry, names and urls preserved.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{CreateSourceRequest, NewsSource, SourceType};
use crate::services::source_service::{OpmlGateway, SourceService};
use crate::tests::common::{create_test_db, rss_source};

/// Gateway double keeping "files" as in-memory outlines.
#[derive(Default)]
struct MemoryOpmlGateway {
    files: Mutex<HashMap<String, Vec<(String, Option<String>, String)>>>,
}

#[async_trait]
impl OpmlGateway for MemoryOpmlGateway {
    async fn export_sources(&self, sources: &[NewsSource], path: &str) -> (bool, String) {
        let outlines = sources
            .iter()
            .map(|s| (s.name.clone(), s.url.clone(), s.category_name.clone()))
            .collect::<Vec<_>>();
        let count = outlines.len();
        self.files.lock().await.insert(path.to_string(), outlines);
        (true, format!("已导出 {} 个订阅源", count))
    }

    async fn import_sources(
        &self,
        path: &str,
        import: &(dyn Fn(CreateSourceRequest) + Send + Sync),
    ) -> (bool, String) {
        let files = self.files.lock().await;
        let Some(outlines) = files.get(path) else {
            return (false, format!("文件不存在: {}", path));
        };

        for (name, url, category) in outlines {
            import(CreateSourceRequest {
                name: name.clone(),
                source_type: SourceType::Rss,
                url: url.clone(),
                category_name: Some(category.clone()),
                is_enabled: true,
                is_user_added: true,
                custom_config: None,
                notes: None,
            });
        }
        (true, format!("已导入 {} 个订阅源", outlines.len()))
    }
}

#[tokio::test]
async fn export_then_import_restores_names_and_urls() {
    let gateway = MemoryOpmlGateway::default();

    // populate the first registry
    let source_service = SourceService::new(create_test_db().await);
    for name in ["Feed One", "Feed Two", "Feed Three"] {
        source_service
            .add_source(&rss_source(name, &format!("https://{}/rss", name.replace(' ', "-"))))
            .await
            .unwrap();
    }
    let exported = source_service.list_sources().await.unwrap();

    let (ok, message) = gateway.export_sources(&exported, "/tmp/feeds.opml").await;
    assert!(ok);
    assert!(message.contains('3'));

    // import into a fresh, empty registry; the sink queues synchronously,
    // the actual inserts happen below
    let fresh = Arc::new(SourceService::new(create_test_db().await));
    let queued = std::sync::Mutex::new(Vec::new());
    let (ok, _) = gateway
        .import_sources("/tmp/feeds.opml", &|req| queued.lock().unwrap().push(req))
        .await;
    assert!(ok);

    for req in queued.into_inner().unwrap() {
        fresh.add_source(&req).await.unwrap();
    }

    let imported = fresh.list_sources().await.unwrap();
    assert_eq!(imported.len(), 3);
    for name in ["Feed One", "Feed Two", "Feed Three"] {
        let source = imported.iter().find(|s| s.name == name).expect("imported source");
        assert_eq!(
            source.url.as_deref(),
            Some(format!("https://{}/rss", name.replace(' ', "-")).as_str())
        );
    }

    let (ok, message) = gateway.import_sources("/missing.opml", &|_| {}).await;
    assert!(!ok);
    assert!(message.contains("文件不存在"));
}
