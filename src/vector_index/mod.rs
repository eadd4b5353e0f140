//! VectorIndex: retrieval store consumed by SchemaTrainer/SQLGenerator
//! (spec §4.4). The real backing store is out of scope; `memory` ships a
//! minimal reference implementation so the pipeline is runnable and
//! testable without one.

pub mod memory;

pub use memory::InMemoryVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("vector index backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedItem {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: IndexedItem,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, namespace: &str, items: Vec<IndexedItem>) -> Result<(), VectorIndexError>;
    async fn query(&self, namespace: &str, text: &str, k: usize) -> Result<Vec<ScoredItem>, VectorIndexError>;
    async fn delete(&self, namespace: &str) -> Result<(), VectorIndexError>;
}
