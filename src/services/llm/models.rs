//! LLM configuration and exchange models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Providers
// ============================================================================

/// Provider family a profile talks to. Drives the key-loading strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Google,
    Openai,
    Anthropic,
    Ollama,
    VolcengineArk,
    Moonshot,
    Baidu,
    Azure,
    Xai,
    Mistral,
    Fireworks,
    Generic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::VolcengineArk => "volcengine_ark",
            Self::Moonshot => "moonshot",
            Self::Baidu => "baidu",
            Self::Azure => "azure",
            Self::Xai => "xai",
            Self::Mistral => "mistral",
            Self::Fireworks => "fireworks",
            Self::Generic => "generic",
        }
    }

    pub fn parse_provider(s: &str) -> Option<Self> {
        match s {
            "google" => Some(Self::Google),
            "openai" => Some(Self::Openai),
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            "volcengine_ark" => Some(Self::VolcengineArk),
            "moonshot" => Some(Self::Moonshot),
            "baidu" => Some(Self::Baidu),
            "azure" => Some(Self::Azure),
            "xai" => Some(Self::Xai),
            "mistral" => Some(Self::Mistral),
            "fireworks" => Some(Self::Fireworks),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }

    /// Infer the provider from a profile name and/or api url.
    pub fn infer(name: &str, api_url: &str) -> Self {
        let name_lower = name.to_lowercase();
        let url_lower = api_url.to_lowercase();

        if name_lower.contains("gemini") || name_lower.contains("google") || url_lower.contains("google") {
            return Self::Google;
        }
        if url_lower.contains("volcengine") || url_lower.contains("volces") || name_lower.contains("volc") || name.contains("火山") {
            return Self::VolcengineArk;
        }
        if name_lower.contains("azure") || url_lower.contains("azure") {
            return Self::Azure;
        }
        if name_lower.contains("openai") || url_lower.contains("openai") {
            return Self::Openai;
        }
        if name_lower.contains("anthropic") || url_lower.contains("anthropic") {
            return Self::Anthropic;
        }
        if name_lower.contains("ollama") || url_lower.contains("ollama") {
            return Self::Ollama;
        }
        if name_lower.contains("xai") || url_lower.contains("xai") {
            return Self::Xai;
        }
        if name_lower.contains("mistral") || url_lower.contains("mistral") {
            return Self::Mistral;
        }
        if name_lower.contains("fireworks") || url_lower.contains("fireworks") {
            return Self::Fireworks;
        }
        if name_lower.contains("kimi") || name_lower.contains("moonshot") || url_lower.contains("moonshot") {
            return Self::Moonshot;
        }
        if name_lower.contains("ernie") || url_lower.contains("aip.baidubce.com") {
            return Self::Baidu;
        }

        Self::Generic
    }

    /// Environment-variable prefix of the provider family.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Google => "GEMINI",
            Self::VolcengineArk => "VOLC",
            Self::Openai => "OPENAI",
            Self::Azure => "AZURE",
            _ => "LLM",
        }
    }
}

// ============================================================================
// API keys
// ============================================================================

/// Credential shape: a single key, a legacy key list, or an
/// access-key/secret-key pair for providers requiring dual credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ApiKey {
    Single(String),
    Multi(Vec<String>),
    AkSk { access_key: String, secret_key: String },
}

impl ApiKey {
    /// Collapse to the single token used as a bearer credential.
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::Single(key) => Some(key.as_str()).filter(|k| !k.is_empty()),
            Self::Multi(keys) => keys.first().map(|k| k.as_str()).filter(|k| !k.is_empty()),
            Self::AkSk { access_key, .. } => {
                Some(access_key.as_str()).filter(|k| !k.is_empty())
            },
        }
    }

    /// Trim whitespace on every contained string.
    pub fn trimmed(self) -> Self {
        match self {
            Self::Single(key) => Self::Single(key.trim().to_string()),
            Self::Multi(keys) => {
                Self::Multi(keys.into_iter().map(|k| k.trim().to_string()).collect())
            },
            Self::AkSk { access_key, secret_key } => Self::AkSk {
                access_key: access_key.trim().to_string(),
                secret_key: secret_key.trim().to_string(),
            },
        }
    }
}

/// Mask a key for logging: keep at most the last 4 characters.
pub fn mask_api_key(api_key: Option<&str>) -> String {
    match api_key {
        None => "<Not Set>".to_string(),
        Some(key) if key.is_empty() => "<Not Set>".to_string(),
        Some(key) if key.len() > 8 => {
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("***{}", tail)
        },
        Some(_) => "***".to_string(),
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// A named LLM configuration profile with its resolved credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LlmProfile {
    pub name: String,
    pub provider: Provider,
    pub api_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
    /// Azure-style base endpoint resolved from the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub timeout_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub custom_config: Option<serde_json::Value>,
}

impl LlmProfile {
    pub fn has_credentials(&self) -> bool {
        // local runtimes such as ollama run keyless
        matches!(self.provider, Provider::Ollama)
            || self.api_key.as_ref().and_then(|k| k.bearer_token()).is_some()
    }
}

/// Display projection with the key masked.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LlmProfileInfo {
    pub name: String,
    pub provider: Provider,
    pub api_url: String,
    pub model: String,
    pub api_key_masked: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub timeout_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub is_active: bool,
}

impl LlmProfileInfo {
    pub fn from_profile(profile: &LlmProfile, is_active: bool) -> Self {
        Self {
            name: profile.name.clone(),
            provider: profile.provider,
            api_url: profile.api_url.clone(),
            model: profile.model.clone(),
            api_key_masked: mask_api_key(
                profile.api_key.as_ref().and_then(|k| k.bearer_token()),
            ),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            timeout_seconds: profile.timeout_seconds,
            system_prompt: profile.system_prompt.clone(),
            is_active,
        }
    }
}

/// Create-or-replace payload for a profile.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpsertProfileRequest {
    pub provider: Option<Provider>,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub model: String,
    pub api_key: Option<ApiKey>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: i64,
    pub system_prompt: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub custom_config: Option<serde_json::Value>,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> i64 {
    2048
}
fn default_timeout() -> i64 {
    60
}

// ============================================================================
// Analysis exchange shapes
// ============================================================================

/// Minimal article shape consumed by LLM prompts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisItem {
    pub title: String,
    pub content: String,
    pub source: String,
    pub pub_date: String,
    pub url: String,
}

/// Textual result of an analysis call, with optional scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalysisPayload {
    pub analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stance: Option<f64>,
}

/// Importance (0..10) and stance (-1.0..1.0) scores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct ImportanceStance {
    pub importance: f64,
    pub stance: f64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("LLM 服务未配置")]
    NotConfigured,

    #[error("配置 '{0}' 不存在")]
    ProfileNotFound(String),

    #[error("配置名称不能为空")]
    EmptyProfileName,

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM response parsing error: {0}")]
    ParseError(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LLMError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_) | Self::ApiError(_))
    }
}
