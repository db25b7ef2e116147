pub mod analysis_engine;
pub mod analysis_store;
pub mod article_service;
pub mod clusterer;
pub mod data_processor;
pub mod history_service;
pub mod llm;
pub mod source_service;
pub mod source_status_service;

pub use analysis_engine::{AnalysisEngine, AnalysisError, AnalysisOutput};
pub use analysis_store::AnalysisStore;
pub use article_service::ArticleService;
pub use clusterer::{
    ClusterArticle, ClustererOptions, EnhancedClusterer, EventCluster, FeatureWeights,
};
pub use data_processor::{DataProcessor, NewsGrouping};
pub use history_service::HistoryService;
pub use llm::{
    AnalysisItem, AnalysisPayload, ApiKey, ImportanceStance, LLMClient, LLMConfigManager,
    LLMError, LLMService, LlmProfile, LlmProfileInfo, OpenAiCompatLLMService, PromptManager,
    Provider, UpsertProfileRequest,
};
pub use source_service::{OpmlGateway, SourceService};
pub use source_status_service::{
    BatchSummary, HttpSourceProbe, SourceProbe, SourceStatusEvent, SourceStatusService,
};
