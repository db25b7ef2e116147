//! HTTP client for OpenAI-compatible chat-completion APIs.
//!
//! The configured profile supplies endpoint, model, and limits. Providers
//! with native protocols (Gemini, Ark) are reached through their
//! OpenAI-compatible endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::models::{LLMError, LlmProfile};

pub struct LLMClient {
    http_client: Client,
}

impl Default for LLMClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LLMClient {
    pub fn new() -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client }
    }

    fn endpoint(profile: &LlmProfile) -> String {
        let base = profile
            .api_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(profile.api_url.as_str());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// One chat-completion round trip; returns the assistant message text.
    pub async fn chat_completion(
        &self,
        profile: &LlmProfile,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, LLMError> {
        let api_key = profile
            .api_key
            .as_ref()
            .and_then(|k| k.bearer_token())
            .map(str::to_string);

        let mut messages = Vec::new();
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage { role: "system".to_string(), content: system.to_string() });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: user_prompt.to_string() });

        let chat_request = ChatCompletionRequest {
            model: profile.model.clone(),
            messages,
            max_tokens: Some(profile.max_tokens.max(1) as u32),
            temperature: Some(profile.temperature),
        };

        let url = Self::endpoint(profile);
        tracing::debug!("Calling LLM API: {} with model {}", url, profile.model);

        let mut request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(profile.timeout_seconds.max(1) as u64))
            .json(&chat_request);
        if let Some(key) = &api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::Timeout(profile.timeout_seconds.max(1) as u64)
            } else {
                LLMError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LLMError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LLMError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LLMError::ParseError("Empty response from LLM".to_string()))
    }

    /// Connectivity probe: models listing first, minimal chat as fallback.
    pub async fn test_connection(&self, profile: &LlmProfile) -> Result<(), LLMError> {
        let api_key = profile
            .api_key
            .as_ref()
            .and_then(|k| k.bearer_token())
            .map(str::to_string);

        let base = profile
            .api_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(profile.api_url.as_str());
        let url = format!("{}/models", base.trim_end_matches('/'));

        let mut request = self.http_client.get(&url).timeout(Duration::from_secs(10));
        if let Some(key) = &api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::Timeout(10)
            } else if e.is_connect() {
                LLMError::ApiError(format!("Connection failed: {}", e))
            } else {
                LLMError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LLMError::ApiError("Invalid API key".to_string()));
        }

        if !status.is_success() {
            return self.test_with_chat(profile).await;
        }

        Ok(())
    }

    async fn test_with_chat(&self, profile: &LlmProfile) -> Result<(), LLMError> {
        let mut minimal = profile.clone();
        minimal.max_tokens = 1;
        minimal.temperature = 0.0;
        minimal.timeout_seconds = 15;

        self.chat_completion(&minimal, None, "Hi").await.map(|_| ())
    }
}

// ============================================================================
// OpenAI API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
