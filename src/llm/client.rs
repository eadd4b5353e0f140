//! LLMClient: HTTP client for OpenAI-compatible chat completion APIs
//! (spec §4.5), adapted from services/llm/client.rs's `LLMClient::chat_completion`.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStreamChunk, ChatMessage,
    CompletionOptions, LLMError, StreamChunk,
};

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String, LLMError>;

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<StreamChunk, LLMError>>;
}

pub struct HttpLLMClient {
    http_client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpLLMClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http_client = Client::builder().build().expect("failed to build HTTP client");
        Self { http_client, api_base: api_base.into(), api_key: api_key.into(), model: model.into() }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMClient for HttpLLMClient {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String, LLMError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        tracing::debug!(endpoint = %self.endpoint(), model = %self.model, "calling LLM chat completion");

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout(options.timeout_ms / 1000)
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
            let body = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(LLMError::ApiError(format!("API error {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| LLMError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LLMError::ParseError("empty response from LLM".to_string()))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<StreamChunk, LLMError>> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: true,
        };

        let send_result = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await;

        let response = match send_result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                let status = r.status();
                return stream::once(async move { Err(LLMError::ApiError(format!("API error {status}"))) }).boxed();
            },
            Err(e) => {
                let err = if e.is_timeout() { LLMError::Timeout(options.timeout_ms / 1000) } else { LLMError::ApiError(e.to_string()) };
                return stream::once(async move { Err(err) }).boxed();
            },
        };

        let byte_stream = response.bytes_stream();
        stream::unfold((byte_stream, String::new(), cancel), |(mut bytes, mut buffer, cancel)| async move {
            loop {
                if cancel.is_cancelled() {
                    return Some((Err(LLMError::Cancelled), (bytes, buffer, cancel)));
                }

                if let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);
                    if line.is_empty() || !line.starts_with("data: ") {
                        continue;
                    }
                    let payload = &line["data: ".len()..];
                    if payload == "[DONE]" {
                        return Some((Ok(StreamChunk { delta: String::new(), finished: true }), (bytes, buffer, cancel)));
                    }
                    return match serde_json::from_str::<ChatCompletionStreamChunk>(payload) {
                        Ok(chunk) => {
                            let choice = chunk.choices.into_iter().next();
                            let delta = choice.as_ref().and_then(|c| c.delta.content.clone()).unwrap_or_default();
                            let finished = choice.and_then(|c| c.finish_reason).is_some();
                            Some((Ok(StreamChunk { delta, finished }), (bytes, buffer, cancel)))
                        },
                        Err(e) => Some((Err(LLMError::ParseError(e.to_string())), (bytes, buffer, cancel))),
                    };
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.push_str(&String::from_utf8_lossy(&chunk)),
                    Some(Err(e)) => return Some((Err(LLMError::ApiError(e.to_string())), (bytes, buffer, cancel))),
                    None => return None,
                }
            }
        })
        .boxed()
    }
}
