use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use lantern::config::Config;
use lantern::services::clusterer::EnhancedClusterer;
use lantern::services::{
    AnalysisEngine, AnalysisStore, ArticleService, DataProcessor, HistoryService,
    HttpSourceProbe, LLMConfigManager, LLMService, OpenAiCompatLLMService, SourceService,
    SourceStatusService,
};
use lantern::utils::ScheduledExecutor;
use lantern::{AppState, db, handlers, models, services};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::articles::list_articles,
        handlers::articles::get_article,
        handlers::articles::upsert_article,
        handlers::sources::list_sources,
        handlers::sources::create_source,
        handlers::sources::refresh_sources,
        handlers::analysis::run_analysis,
    ),
    components(
        schemas(
            models::Article,
            models::ArticleUpsert,
            models::NewsSource,
            models::SourceType,
            models::SourceHealth,
            models::CreateSourceRequest,
            models::UpdateSourceRequest,
            models::HistoryEntry,
            models::AnalysisRecord,
            services::BatchSummary,
            services::AnalysisOutput,
            services::EventCluster,
            services::ClusterArticle,
            handlers::sources::RefreshRequest,
            handlers::analysis::RunAnalysisRequest,
        )
    ),
    tags(
        (name = "Articles", description = "Article storage and browsing history"),
        (name = "Sources", description = "News source management and health checks"),
        (name = "Analysis", description = "Clustering and LLM-backed analysis"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // the single allowed bootstrap message outside tracing
    if let Ok(path) = dotenvy::dotenv() {
        println!("Loaded environment from {}", path.display());
    }

    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    let _guard;
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("lantern.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = guard;
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Lantern starting up");

    let database = db::open(&config.database.url, config.database.ddl_path.as_deref()).await?;
    let pool = database.pool.clone();
    tracing::info!("Database ready (just created: {})", database.just_created);

    // services, leaves first
    let article_service = Arc::new(ArticleService::new(pool.clone()));
    let source_service = Arc::new(SourceService::new(pool.clone()));
    let history_service = Arc::new(HistoryService::new(pool.clone()));
    let analysis_store = Arc::new(AnalysisStore::new(pool.clone()));

    let config_manager = Arc::new(LLMConfigManager::new(pool.clone()));
    if database.just_created {
        source_service.seed_presets().await?;
        config_manager.seed_default_if_empty().await?;
    }

    let llm_service = Arc::new(OpenAiCompatLLMService::new(Arc::clone(&config_manager)));
    if let Err(e) = llm_service.reload_active_config().await {
        tracing::warn!("No usable active LLM profile at startup: {}", e);
    }

    let clusterer = Arc::new(
        EnhancedClusterer::new(config.clustering.to_options())
            .with_llm(Arc::clone(&llm_service) as Arc<dyn LLMService>),
    );

    let data_processor = Arc::new(DataProcessor::new(
        Arc::clone(&article_service),
        Arc::clone(&analysis_store),
        Arc::clone(&clusterer),
    ));

    let analysis_engine = Arc::new(AnalysisEngine::new(
        Arc::clone(&llm_service) as Arc<dyn LLMService>,
        Arc::clone(&data_processor),
    ));

    let probe = Arc::new(HttpSourceProbe::new(Duration::from_secs(
        config.status_check.probe_timeout_secs,
    )));
    let source_status_service =
        Arc::new(SourceStatusService::new(Arc::clone(&source_service), probe));

    let app_state = Arc::new(AppState {
        db: pool.clone(),
        article_service: Arc::clone(&article_service),
        source_service: Arc::clone(&source_service),
        history_service: Arc::clone(&history_service),
        analysis_store: Arc::clone(&analysis_store),
        config_manager: Arc::clone(&config_manager),
        llm_service: Arc::clone(&llm_service),
        data_processor: Arc::clone(&data_processor),
        analysis_engine: Arc::clone(&analysis_engine),
        source_status_service: Arc::clone(&source_status_service),
    });

    if config.status_check.enabled {
        let interval = Duration::from_secs(config.status_check.interval_secs);
        tracing::info!("Starting source status refresh with interval: {:?}", interval);
        let executor = ScheduledExecutor::new("source-status-refresh", interval);
        let service = Arc::clone(&source_status_service);
        tokio::spawn(async move {
            executor.start(service).await;
        });
    } else {
        tracing::warn!("Periodic source status refresh disabled by configuration");
    }

    let api_routes = Router::new()
        .route(
            "/api/articles",
            get(handlers::articles::list_articles).post(handlers::articles::upsert_article),
        )
        .route("/api/articles/batch", post(handlers::articles::upsert_articles_batch))
        .route("/api/articles/count", get(handlers::articles::count_articles))
        .route("/api/articles/read-status", put(handlers::articles::set_read_status))
        .route(
            "/api/articles/null-publish-time",
            delete(handlers::articles::delete_articles_with_null_publish_time),
        )
        .route("/api/articles/:id", get(handlers::articles::get_article))
        .route("/api/articles/:id/analyses", get(handlers::articles::get_article_analyses))
        .route(
            "/api/history",
            get(handlers::articles::list_history)
                .post(handlers::articles::add_history)
                .delete(handlers::articles::clear_history),
        )
        .route("/api/history/:id", delete(handlers::articles::delete_history_entry))
        .route(
            "/api/sources",
            get(handlers::sources::list_sources).post(handlers::sources::create_source),
        )
        .route("/api/sources/refresh", post(handlers::sources::refresh_sources))
        .route("/api/sources/refresh/cancel", post(handlers::sources::cancel_refresh))
        .route(
            "/api/sources/:name",
            put(handlers::sources::update_source).delete(handlers::sources::delete_source),
        )
        .route("/api/analysis/run", post(handlers::analysis::run_analysis))
        .route("/api/analysis/group", post(handlers::analysis::group_news))
        .route("/api/analysis/load", post(handlers::analysis::load_news))
        .route("/api/analysis/categories/:id", get(handlers::analysis::get_category))
        .route(
            "/api/analyses",
            get(handlers::analysis::list_analyses).delete(handlers::analysis::delete_all_analyses),
        )
        .route("/api/analyses/:id", delete(handlers::analysis::delete_analysis))
        .route(
            "/api/llm/configs",
            get(handlers::llm_profiles::list_profiles),
        )
        .route(
            "/api/llm/configs/active",
            get(handlers::llm_profiles::get_active_profile)
                .put(handlers::llm_profiles::set_active_profile),
        )
        .route(
            "/api/llm/configs/:name",
            get(handlers::llm_profiles::get_profile)
                .put(handlers::llm_profiles::upsert_profile)
                .delete(handlers::llm_profiles::delete_profile),
        )
        .route("/api/llm/configs/:name/test", post(handlers::llm_profiles::test_profile))
        .route("/api/llm/status", get(handlers::llm_profiles::get_status))
        .with_state(Arc::clone(&app_state));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
