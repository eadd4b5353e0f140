//! Wire types for the OpenAI-compatible chat completions API, plus the
//! LLMError taxonomy (spec §4.5), adapted from
//! services/llm/models.rs's `LLMError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { temperature: 0.0, max_tokens: 2048, timeout_ms: 60_000 }
    }
}

#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: String,
    pub finished: bool,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("no LLM provider configured")]
    NoProviderConfigured,
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("failed to parse LLM response: {0}")]
    ParseError(String),
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),
    #[error("LLM request cancelled")]
    Cancelled,
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl LLMError {
    /// Whether the self-correction loop or a caller may retry without
    /// operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_) | Self::ApiError(_))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionStreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StreamChoice {
    pub delta: StreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct StreamDelta {
    pub content: Option<String>,
}
