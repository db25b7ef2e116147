//! LLM subsystem: configuration profiles, chat client, service contract.

pub mod client;
pub mod config_manager;
pub mod models;
pub mod prompts;
pub mod service;


pub use client::LLMClient;
pub use config_manager::LLMConfigManager;
pub use models::{
    AnalysisItem, AnalysisPayload, ApiKey, ImportanceStance, LLMError, LlmProfile, LlmProfileInfo,
    Provider, UpsertProfileRequest, mask_api_key,
};
pub use prompts::{KNOWN_KINDS, PromptManager};
pub use service::{LLMService, OpenAiCompatLLMService, parse_llm_reply};
