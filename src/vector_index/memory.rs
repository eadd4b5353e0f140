use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

use super::{IndexedItem, ScoredItem, VectorIndex, VectorIndexError};

/// Cosine similarity over a trivial bag-of-words vectorizer. Good enough to
/// exercise the pipeline end to end; not a substitute for a real embedding
/// store.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    namespaces: DashMap<String, Vec<IndexedItem>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn vectorize(text: &str) -> HashMap<String, f32> {
        let mut counts: HashMap<String, f32> = HashMap::new();
        for token in text.to_lowercase().split_whitespace() {
            *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
        }
        counts
    }

    fn cosine_similarity(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
        let dot: f32 = a.iter().map(|(k, v)| v * b.get(k).unwrap_or(&0.0)).sum();
        let norm_a: f32 = a.values().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = b.values().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, namespace: &str, items: Vec<IndexedItem>) -> Result<(), VectorIndexError> {
        let mut entry = self.namespaces.entry(namespace.to_string()).or_default();
        for item in items {
            if let Some(existing) = entry.iter_mut().find(|i| i.id == item.id) {
                *existing = item;
            } else {
                entry.push(item);
            }
        }
        Ok(())
    }

    async fn query(&self, namespace: &str, text: &str, k: usize) -> Result<Vec<ScoredItem>, VectorIndexError> {
        let Some(items) = self.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let query_vec = Self::vectorize(text);
        let mut scored: Vec<ScoredItem> = items
            .iter()
            .map(|item| {
                let item_vec = Self::vectorize(&item.text);
                ScoredItem { item: item.clone(), score: Self::cosine_similarity(&query_vec, &item_vec) }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, namespace: &str) -> Result<(), VectorIndexError> {
        self.namespaces.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str) -> IndexedItem {
        IndexedItem { id: id.to_string(), text: text.to_string(), metadata: serde_json::Value::Null }
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert("fp1", vec![item("a", "customer orders table"), item("b", "product inventory table")])
            .await
            .unwrap();
        let results = index.query("fp1", "customer orders", 1).await.unwrap();
        assert_eq!(results[0].item.id, "a");
    }

    #[tokio::test]
    async fn query_on_unknown_namespace_is_empty() {
        let index = InMemoryVectorIndex::new();
        let results = index.query("missing", "anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn delete_clears_namespace() {
        let index = InMemoryVectorIndex::new();
        index.upsert("fp1", vec![item("a", "table")]).await.unwrap();
        index.delete("fp1").await.unwrap();
        assert!(index.query("fp1", "table", 5).await.unwrap().is_empty());
    }
}
