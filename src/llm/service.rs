//! LLMService: caching wrapper over an [`LLMClient`] (spec §4.5, §4.3
//! ambient caching), adapted from services/llm/service.rs's
//! `LLMServiceImpl::analyze` cache-hit/cache-miss logging.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::client::LLMClient;
use super::models::{ChatMessage, CompletionOptions, LLMError};
use super::repository::LLMRepository;

pub struct LLMService {
    client: Arc<dyn LLMClient>,
    repository: Option<LLMRepository>,
}

impl LLMService {
    pub fn new(client: Arc<dyn LLMClient>, repository: Option<LLMRepository>) -> Self {
        Self { client, repository }
    }

    fn cache_key(messages: &[ChatMessage], options: &CompletionOptions) -> String {
        let mut hasher = Sha256::new();
        for message in messages {
            hasher.update(message.role.as_bytes());
            hasher.update(b"\0");
            hasher.update(message.content.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(options.temperature.to_be_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Completes via the underlying client, transparently caching
    /// deterministic (temperature 0) completions by prompt hash.
    pub async fn complete_cached(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String, LLMError> {
        let cache_key = Self::cache_key(messages, options);

        if options.temperature == 0.0 {
            if let Some(repository) = &self.repository {
                if let Some(cached) = repository.get(&cache_key).await? {
                    tracing::info!(cache_key = %cache_key, "LLM cache hit");
                    return Ok(cached);
                }
            }
        }

        tracing::info!(cache_key = %cache_key, "LLM cache miss, calling client");
        let response = self.client.complete(messages, options).await?;

        if options.temperature == 0.0 {
            if let Some(repository) = &self.repository {
                repository.put(&cache_key, &cache_key, &response).await?;
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::StreamChunk;
    use async_trait::async_trait;
    use futures_util::stream::{self, BoxStream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMClient for CountingClient {
        async fn complete(&self, _messages: &[ChatMessage], _options: &CompletionOptions) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("SELECT 1".to_string())
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _options: &CompletionOptions,
            _cancel: CancellationToken,
        ) -> BoxStream<'static, Result<StreamChunk, LLMError>> {
            stream::empty().boxed()
        }
    }

    #[tokio::test]
    async fn without_repository_every_call_hits_the_client() {
        let client = Arc::new(CountingClient { calls: AtomicUsize::new(0) });
        let service = LLMService::new(client.clone(), None);
        let messages = vec![ChatMessage::user("hi")];
        let options = CompletionOptions::default();
        service.complete_cached(&messages, &options).await.unwrap();
        service.complete_cached(&messages, &options).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
