//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the generation capability the
//! pipeline agents consume. The `LlmProvider` trait defines the contract:
//! take a system role and a user prompt, return the generated text. Provider
//! failures are typed so agents can convert them into stage failures without
//! crashing a run.

use async_trait::async_trait;

pub mod chat;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// LLM provider trait that all providers must implement.
///
/// A provider is a potentially slow, potentially failing external call;
/// callers are expected to apply their own timeout at the stage boundary.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "chat", "scripted")
    fn name(&self) -> &str;

    /// Generate a response from the LLM.
    ///
    /// # Arguments
    /// * `system_role` - System instructions framing the request
    /// * `user_prompt` - The user-facing prompt to respond to
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text, treated as opaque by callers
    /// * `Err(LlmError)` - If the request fails
    async fn generate(&self, system_role: &str, user_prompt: &str) -> Result<String>;

    /// Check if the provider is currently healthy and available.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}
