//! LLMClient: the pipeline's only outbound-network seam (spec §4.5).

pub mod client;
pub mod models;
pub mod repository;
pub mod service;

pub use client::{HttpLLMClient, LLMClient};
pub use models::{ChatMessage, CompletionOptions, LLMError, StreamChunk};
pub use repository::LLMRepository;
pub use service::LLMService;
