//! LLM completion collaborator: `CompleteText(ctx, prompt, model) -> string`.
//!
//! `CloudLlmCompletion` dispatches between the OpenAI-compatible chat
//! completions wire format (OpenRouter, OpenAI) and the Anthropic
//! Messages API, mirroring the dual-body-format dispatch used elsewhere
//! in this codebase for the same two wire shapes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("rate limited")]
    RateLimited,
    #[error("non-2xx status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("no content in response")]
    NoContent,
}

#[async_trait]
pub trait LlmCompletion: Send + Sync {
    async fn complete_text(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy)]
enum LlmProvider {
    OpenRouter,
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenRouter => write!(f, "OpenRouter"),
            LlmProvider::OpenAi => write!(f, "OpenAI"),
            LlmProvider::Anthropic => write!(f, "Anthropic"),
        }
    }
}

pub struct CloudLlmCompletion {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    provider: LlmProvider,
}

impl CloudLlmCompletion {
    /// Auto-detects the provider from environment variables, checking
    /// `OPENROUTER_API_KEY` → `OPENAI_API_KEY` → `ANTHROPIC_API_KEY` in
    /// order. Returns `None` when no key is found.
    pub fn from_env() -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .ok()?;

        if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
            let model = std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-sonnet-4".to_string());
            let base_url = std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
            return Some(Self {
                client,
                api_key,
                base_url,
                model,
                provider: LlmProvider::OpenRouter,
            });
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            let base_url = std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
            return Some(Self {
                client,
                api_key,
                base_url,
                model,
                provider: LlmProvider::OpenAi,
            });
        }
        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            let model = std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5-20250514".to_string());
            let base_url = std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());
            return Some(Self {
                client,
                api_key,
                base_url,
                model,
                provider: LlmProvider::Anthropic,
            });
        }
        tracing::info!("no LLM API key found in environment, LLM claim extraction disabled");
        None
    }

    async fn openai_completion(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "max_tokens": 1024,
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = resp_json.get("usage") {
            tracing::info!(
                provider = %self.provider,
                model = %self.model,
                prompt_tokens = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                completion_tokens = usage.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                "llm usage"
            );
        }

        resp_json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or(LlmError::NoContent)
    }

    async fn anthropic_completion(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system,
            "messages": [ { "role": "user", "content": user } ],
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        resp_json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.iter().find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text")))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or(LlmError::NoContent)
    }
}

#[async_trait]
impl LlmCompletion for CloudLlmCompletion {
    async fn complete_text(&self, system: &str, user: &str) -> Result<String, LlmError> {
        match self.provider {
            LlmProvider::Anthropic => self.anthropic_completion(system, user).await,
            _ => self.openai_completion(system, user).await,
        }
    }
}

/// Scriptable stand-in for tests: returns queued responses in order,
/// optionally simulating timeouts before success (used to test the
/// LLM retry/backoff policy in `claims::llm`).
pub struct MockLlmCompletion {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
}

impl MockLlmCompletion {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LlmCompletion for MockLlmCompletion {
    async fn complete_text(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::NoContent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_queued_responses_in_order() {
        let mock = MockLlmCompletion::new(vec![
            Err(LlmError::Timeout),
            Ok("[]".to_string()),
        ]);
        assert!(matches!(mock.complete_text("s", "u").await, Err(LlmError::Timeout)));
        assert_eq!(mock.complete_text("s", "u").await.unwrap(), "[]");
    }
}
