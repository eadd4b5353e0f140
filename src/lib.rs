//! nl2sql-engine library
//!
//! Wires every component (dialect profiles, schema introspection, vector
//! retrieval, the LLM client, SQL generation/validation/correction, query
//! execution, chart advice and process discovery) behind one
//! [`PipelineEngine`] entry point.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub mod chart;
pub mod config;
pub mod correction;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod generator;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod process;
pub mod schema_mgr;
pub mod training;
pub mod utils;
pub mod validator;
pub mod vector_index;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::PipelineEngine;

/// Application shared state: every service the HTTP handlers reach through,
/// wrapped in `Arc` for cheap cloning across axum's per-request tasks.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineEngine>,
}

impl AppState {
    /// Builds every service from a loaded [`Config`] and opens the SQLite
    /// cache pool. Callers own the `Config` lifetime; this only consumes it
    /// to construct long-lived `Arc`s.
    pub async fn build(config: &Config) -> Result<Self, anyhow::Error> {
        if let Some(parent) = std::path::Path::new(&config.cache.sqlite_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let cache_pool: SqlitePool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}?mode=rwc", config.cache.sqlite_path))
            .await?;

        let llm_repository = llm::LLMRepository::new(cache_pool.clone());
        llm_repository.migrate().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let llm_client: Arc<dyn llm::LLMClient> =
            Arc::new(llm::HttpLLMClient::new(config.llm.api_base.clone(), config.llm.api_key.clone(), config.llm.model.clone()));
        let llm_service = Arc::new(llm::LLMService::new(llm_client.clone(), Some(llm_repository)));

        let vector_index: Arc<dyn vector_index::VectorIndex> = Arc::new(vector_index::InMemoryVectorIndex::new());

        let process_discovery = Arc::new(process::ProcessDiscovery::new(
            Duration::from_secs(config.discovery.cache_ttl_s),
            config.discovery.max_cardinality,
        ));

        let mut trainer = training::SchemaTrainer::new(vector_index.clone()).with_categorical_sampling();
        if config.discovery.enabled {
            trainer = trainer.with_process_discovery(process_discovery.clone());
        }
        let trainer = Arc::new(trainer);

        let generator = Arc::new(generator::SQLGenerator::new(
            vector_index.clone(),
            llm_service,
            config.pipeline.retrieval_k_ddl,
            config.pipeline.retrieval_k_examples,
            config.llm.temperature_initial,
            config.llm.temperature_retry_delta,
        ));
        let correction = Arc::new(correction::SelfCorrectionLoop::new(generator, config.pipeline.max_attempts));

        let pool_manager = Arc::new(executor::pool::PoolManager::new());

        let pipeline = Arc::new(PipelineEngine::new(
            trainer,
            correction,
            process_discovery,
            llm_client,
            pool_manager,
            Duration::from_millis(config.pipeline.statement_timeout_ms),
            config.pipeline.row_limit,
        ));

        Ok(Self { pipeline })
    }
}
