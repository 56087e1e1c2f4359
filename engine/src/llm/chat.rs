//! HTTP Chat Provider
//!
//! Implements `LlmProvider` against an Ollama-compatible `/api/chat`
//! endpoint. Works with any server speaking that shape, local or remote.
//!
//! Key behaviors:
//! - Non-streaming requests (one response body per call)
//! - Timeouts map to `LlmError::Timeout`
//! - Connection refusals map to `LlmError::ProviderUnavailable`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmError, LlmProvider, Result};

/// Default request timeout for chat calls
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Chat-endpoint LLM provider
#[derive(Debug, Clone)]
pub struct ChatProvider {
    /// Base URL for the chat API (e.g. http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g. "llama3.1:8b")
    model: String,

    /// HTTP client for API requests
    client: Client,
}

impl ChatProvider {
    /// Create a new chat provider with the default request timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(base_url, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new chat provider with an explicit request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl LlmProvider for ChatProvider {
    fn name(&self) -> &str {
        "chat"
    }

    async fn generate(&self, system_role: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_role.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
        };

        tracing::debug!(
            "Chat request: model={}, system_chars={}, prompt_chars={}",
            self.model,
            system_role.len(),
            user_prompt.len()
        );

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else if e.is_connect() {
                    LlmError::ProviderUnavailable(format!(
                        "Cannot connect to chat endpoint at {}",
                        self.base_url
                    ))
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthenticationFailed(status.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(LlmError::ProviderUnavailable(format!(
                "chat endpoint returned {}",
                status
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        Ok(body.message.content)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Request body for the chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// A single chat message
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response body from the chat endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}
