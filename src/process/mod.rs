//! ProcessDiscovery (C11): schema-time structural discovery plus
//! result-time `ProcessFlow` construction (spec §4.11).

pub mod builder;
pub mod discovery;

use std::sync::Arc;
use std::time::Duration;

use crate::models::{CategoricalValues, DiscoveredProcess, Fingerprint, ProcessFlow, QueryResult, SchemaSnapshot};

pub struct ProcessDiscovery {
    cache: discovery::DiscoveryCache,
    max_cardinality: usize,
}

impl ProcessDiscovery {
    pub fn new(cache_ttl: Duration, max_cardinality: usize) -> Self {
        Self { cache: discovery::DiscoveryCache::new(cache_ttl), max_cardinality }
    }

    /// Schema-time discovery, invoked by `SchemaTrainer` after a successful
    /// ingest. Results are cached per fingerprint until `invalidate` or TTL
    /// expiry.
    pub fn discover_for_schema(&self, fingerprint: Fingerprint, schema: &SchemaSnapshot, categorical_values: &CategoricalValues) -> Vec<DiscoveredProcess> {
        let discovered = discovery::discover(schema, categorical_values, self.max_cardinality);
        self.cache.put(fingerprint, discovered.clone());
        discovered
    }

    pub fn invalidate(&self, fingerprint: Fingerprint) {
        self.cache.invalidate(fingerprint);
    }

    /// Result-time detection (spec §4.11b): inspects `result`'s columns
    /// for a transition or aggregate shape and builds a `ProcessFlow`,
    /// consulting the cached schema-time discoveries for the main table
    /// named in `question` when helpful.
    pub async fn detect(&self, fingerprint: Fingerprint, result: &QueryResult) -> Option<ProcessFlow> {
        let discovered = self.cache.get(fingerprint).unwrap_or_default();
        let best_match = discovered.iter().max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));
        builder::build(result, best_match)
    }
}

pub type SharedProcessDiscovery = Arc<ProcessDiscovery>;
