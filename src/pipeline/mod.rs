//! PipelineCoordinator (C12): orchestrates one natural-language question
//! end to end (spec §4.12).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::chart;
use crate::correction::SelfCorrectionLoop;
use crate::dialect;
use crate::error::PipelineError;
use crate::executor::pool::PoolManager;
use crate::executor::postgres::PostgresExecutor;
use crate::executor::QueryExecutor;
use crate::llm::LLMClient;
use crate::models::{ConnectionConfig, Dialect, Fingerprint, PipelineResult};
use crate::process::ProcessDiscovery;
use crate::schema_mgr::postgres_introspect::PostgresSchemaManager;
use crate::schema_mgr::SchemaManager;
use crate::training::SchemaTrainer;

#[cfg(feature = "oracle-driver")]
use dashmap::DashMap;

/// Builds the `SchemaManager`/`QueryExecutor` pair for one request's
/// `ConnectionConfig` (spec §6: a fresh config arrives on every call, so
/// these can't be fixed at construction like the generator is).
struct Backends {
    schema_manager: Arc<dyn SchemaManager>,
    executor: Arc<dyn QueryExecutor>,
}

pub struct PipelineEngine {
    trainer: Arc<SchemaTrainer>,
    correction: Arc<SelfCorrectionLoop>,
    process_discovery: Arc<ProcessDiscovery>,
    llm_client: Arc<dyn LLMClient>,
    pool_manager: Arc<PoolManager>,
    #[cfg(feature = "oracle-driver")]
    oracle_connections: DashMap<Fingerprint, Arc<std::sync::Mutex<oracle::Connection>>>,
    statement_timeout: Duration,
    row_limit: usize,
}

impl PipelineEngine {
    pub fn new(
        trainer: Arc<SchemaTrainer>,
        correction: Arc<SelfCorrectionLoop>,
        process_discovery: Arc<ProcessDiscovery>,
        llm_client: Arc<dyn LLMClient>,
        pool_manager: Arc<PoolManager>,
        statement_timeout: Duration,
        row_limit: usize,
    ) -> Self {
        Self {
            trainer,
            correction,
            process_discovery,
            llm_client,
            pool_manager,
            #[cfg(feature = "oracle-driver")]
            oracle_connections: DashMap::new(),
            statement_timeout,
            row_limit,
        }
    }

    /// Builds the schema manager and executor for `connection`'s dialect.
    /// Postgres reuses the shared, per-fingerprint pool for both; Oracle's
    /// OCI connection is comparatively expensive to open, so one is cached
    /// per fingerprint and shared between the schema manager and executor.
    async fn backends_for(&self, connection: &ConnectionConfig, fingerprint: Fingerprint) -> Result<Backends, PipelineError> {
        match connection.dialect {
            Dialect::Postgres => {
                let checkout = self
                    .pool_manager
                    .checkout(connection)
                    .await
                    .map_err(|e| PipelineError::SchemaIntrospectionFailed(e.to_string()))?;
                Ok(Backends {
                    schema_manager: Arc::new(PostgresSchemaManager::new(checkout)),
                    executor: Arc::new(PostgresExecutor::new(self.pool_manager.clone(), connection.clone(), self.statement_timeout)),
                })
            },
            #[cfg(feature = "oracle-driver")]
            Dialect::Oracle => {
                use crate::executor::OracleExecutor;
                use crate::schema_mgr::oracle_introspect::OracleSchemaManager;

                let oci_connection = match self.oracle_connections.get(&fingerprint) {
                    Some(existing) => existing.clone(),
                    None => {
                        let connection = connection.clone();
                        let raw = tokio::task::spawn_blocking(move || {
                            let connect_string = format!("{}:{}/{}", connection.host, connection.port, connection.database);
                            oracle::Connection::connect(&connection.credentials.user, &connection.credentials.password, connect_string)
                        })
                        .await
                        .map_err(|e| PipelineError::Internal(e.to_string()))?
                        .map_err(|e| PipelineError::SchemaIntrospectionFailed(e.to_string()))?;
                        let shared = Arc::new(std::sync::Mutex::new(raw));
                        self.oracle_connections.insert(fingerprint, shared.clone());
                        shared
                    },
                };
                Ok(Backends {
                    schema_manager: Arc::new(OracleSchemaManager::new(oci_connection.clone())),
                    executor: Arc::new(OracleExecutor::new(oci_connection, self.statement_timeout)),
                })
            },
            #[cfg(not(feature = "oracle-driver"))]
            Dialect::Oracle => Err(PipelineError::Internal("this build was compiled without oracle-driver support".to_string())),
        }
    }

    /// Runs the five steps from spec §4.12 for one question against
    /// `connection`. Cancellation is cooperative: a cancelled run never
    /// emits a partial `PipelineResult`.
    pub async fn process(&self, question: &str, connection: &ConnectionConfig, cancel: &CancellationToken) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let fingerprint = connection.fingerprint();

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let backends = self.backends_for(connection, fingerprint).await?;

        self.trainer
            .ensure_trained(fingerprint, connection, backends.schema_manager.as_ref(), Some(backends.executor.as_ref()))
            .await
            .map_err(|e| PipelineError::SchemaIntrospectionFailed(e.to_string()))?;

        let dialect_profile = dialect::for_dialect(connection.dialect);
        let namespace = fingerprint.to_string();
        let categorical_values = self.trainer.categorical_values(fingerprint);

        let outcome = self
            .correction
            .run(
                question,
                &namespace,
                categorical_values.as_ref(),
                dialect_profile.as_ref(),
                backends.executor.as_ref(),
                self.row_limit,
                cancel,
            )
            .await?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let (chart, process) = tokio::join!(
            chart::recommend(&outcome.result, question, Some(self.llm_client.as_ref())),
            self.process_discovery.detect(fingerprint, &outcome.result),
        );

        Ok(PipelineResult {
            sql: outcome.sql,
            attempts: outcome.attempts,
            result: outcome.result,
            chart,
            process,
            latency_ms: started.elapsed(),
        })
    }

    /// Streams a natural-language description of an already-materialized
    /// `PipelineResult` (spec §6). Does not begin until the result exists
    /// (spec §5 ordering guarantee); the coordinator hands the LLM stream
    /// straight through to the caller.
    pub fn describe(
        &self,
        result: &PipelineResult,
        question: &str,
        cancel: CancellationToken,
    ) -> futures_util::stream::BoxStream<'static, Result<String, crate::llm::LLMError>> {
        use crate::llm::ChatMessage;
        use futures_util::stream::{self, StreamExt};

        let prompt = describe_prompt(result, question);
        let messages = vec![
            ChatMessage::system("Describe the query result in two or three plain sentences, no SQL.".to_string()),
            ChatMessage::user(prompt),
        ];
        let options = crate::llm::CompletionOptions::default();
        let client = self.llm_client.clone();

        stream::once(async move { client.stream(&messages, &options, cancel).await })
            .flatten()
            .filter_map(|chunk| async move {
                match chunk {
                    Ok(chunk) if !chunk.finished => Some(Ok(chunk.delta)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed()
    }
}

fn describe_prompt(result: &PipelineResult, question: &str) -> String {
    format!(
        "Question: {question}\nRows returned: {}\nColumns: {}\nTruncated: {}",
        result.result.row_count,
        result.result.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
        result.result.truncated
    )
}
