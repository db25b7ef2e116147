//! Per-source health checks: concurrent probes, status write-back, events.
//!
//! One batch fans out one probe task per enabled source, writes the outcome
//! back through the source service, and emits a per-source event for each
//! completion plus a terminal batch-finished event. Disabled sources are
//! skipped entirely and emit nothing.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use utoipa::ToSchema;

use crate::models::{NewsSource, SourceCheckOutcome, SourceHealth, SourceStatusUpdate};
use crate::services::source_service::SourceService;
use crate::utils::ApiResult;
use crate::utils::datetime::now_naive;
use crate::utils::scheduled_executor::ScheduledTask;

/// External fetch-probe seam; fetching implementations live outside the core.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    async fn probe(&self, source: &NewsSource) -> SourceCheckOutcome;
}

/// Default probe: one HTTP round trip against the source url.
pub struct HttpSourceProbe {
    client: reqwest::Client,
}

impl HttpSourceProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl SourceProbe for HttpSourceProbe {
    async fn probe(&self, source: &NewsSource) -> SourceCheckOutcome {
        let check_time = now_naive();

        let Some(url) = source.url.as_deref().filter(|u| !u.is_empty()) else {
            // collector-backed sources without a url have nothing to probe
            return SourceCheckOutcome {
                success: true,
                message: "无 URL，跳过网络检查".to_string(),
                check_time,
            };
        };

        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => SourceCheckOutcome {
                success: true,
                message: "OK".to_string(),
                check_time,
            },
            Ok(response) => SourceCheckOutcome {
                success: false,
                message: format!("HTTP {}", response.status()),
                check_time,
            },
            Err(e) if e.is_timeout() => SourceCheckOutcome {
                success: false,
                message: "Timeout".to_string(),
                check_time,
            },
            Err(e) => SourceCheckOutcome {
                success: false,
                message: e.to_string(),
                check_time,
            },
        }
    }
}

/// Events emitted while a batch runs. Per-source events may arrive in any
/// order; the batch-finished event is strictly last.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SourceStatusEvent {
    SourceChecked { name: String, success: bool, message: String },
    BatchFinished { total: usize, failures: usize },
}

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct SourceStatusService {
    sources: Arc<SourceService>,
    probe: Arc<dyn SourceProbe>,
    events: broadcast::Sender<SourceStatusEvent>,
    checking: DashMap<String, ()>,
    cancel_requested: AtomicBool,
}

impl SourceStatusService {
    pub fn new(sources: Arc<SourceService>, probe: Arc<dyn SourceProbe>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            sources,
            probe,
            events,
            checking: DashMap::new(),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SourceStatusEvent> {
        self.events.subscribe()
    }

    /// In-memory marker consulted by the UI while a probe is in flight.
    pub fn is_checking(&self, name: &str) -> bool {
        self.checking.contains_key(name)
    }

    /// Request cooperative cancellation. Probes not yet dispatched are
    /// dropped, in-flight ones complete normally; the request is consumed by
    /// the batch that observes it.
    pub fn cancel_batch(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
    }

    /// Check all enabled sources, or the named subset. Returns after every
    /// probe completed and the batch-finished event went out.
    pub async fn check_sources(&self, names: Option<&[String]>) -> ApiResult<BatchSummary> {
        let enabled = self.sources.list_enabled_sources().await?;
        let targets: Vec<NewsSource> = match names {
            None => enabled,
            Some(names) => enabled
                .into_iter()
                .filter(|s| names.iter().any(|n| n == &s.name))
                .collect(),
        };

        if targets.is_empty() {
            tracing::info!("Status check requested but no enabled sources matched");
            let _ = self
                .events
                .send(SourceStatusEvent::BatchFinished { total: 0, failures: 0 });
            return Ok(BatchSummary::default());
        }

        let batch_id = uuid::Uuid::new_v4();
        tracing::info!("Status batch {} checking {} sources", batch_id, targets.len());

        let mut join_set: JoinSet<(String, bool)> = JoinSet::new();
        let mut summary = BatchSummary { total: targets.len(), ..Default::default() };

        for source in targets {
            if self.cancel_requested.load(Ordering::Relaxed) {
                tracing::info!("Status batch cancelled before dispatching '{}'", source.name);
                summary.skipped += 1;
                continue;
            }

            self.checking.insert(source.name.clone(), ());

            let probe = Arc::clone(&self.probe);
            let sources = Arc::clone(&self.sources);
            let events = self.events.clone();
            let prior_errors = source.consecutive_error_count;

            join_set.spawn(async move {
                let outcome = probe.probe(&source).await;

                let (status, last_error, error_count) = if outcome.success {
                    (SourceHealth::Ok, None, 0)
                } else {
                    tracing::warn!("源 '{}' 检查失败: {}", source.name, outcome.message);
                    (SourceHealth::Error, Some(outcome.message.clone()), prior_errors + 1)
                };

                let update = SourceStatusUpdate {
                    status,
                    last_error,
                    consecutive_error_count: error_count,
                    last_checked_time: outcome.check_time,
                };
                if let Err(e) = sources.update_source_status(&source.name, &update).await {
                    tracing::error!("Failed writing status for source '{}': {}", source.name, e);
                }

                let _ = events.send(SourceStatusEvent::SourceChecked {
                    name: source.name.clone(),
                    success: outcome.success,
                    message: outcome.message,
                });

                (source.name, outcome.success)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, success)) => {
                    self.checking.remove(&name);
                    if success {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    tracing::error!("Status probe task panicked: {}", e);
                    summary.failed += 1;
                },
            }
        }

        self.cancel_requested.store(false, Ordering::Relaxed);

        let _ = self.events.send(SourceStatusEvent::BatchFinished {
            total: summary.total,
            failures: summary.failed,
        });

        tracing::info!(
            "Status batch {} finished: {} ok, {} failed, {} skipped",
            batch_id,
            summary.succeeded,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }
}

/// Lets the scheduled executor drive periodic full refreshes.
impl ScheduledTask for SourceStatusService {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move {
            self.check_sources(None).await?;
            Ok(())
        })
    }
}
