//! SchemaTrainer: keeps a connection's VectorIndex namespace in sync with
//! its live schema (spec §4.3).

pub mod cache;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dialect::{self, DialectProfile};
use crate::executor::QueryExecutor;
use crate::models::{CategoricalValues, ConnectionConfig, Dialect, DiscoveredProcess, Fingerprint, SQLQuery, SchemaSnapshot};
use crate::process::ProcessDiscovery;
use crate::schema_mgr::{SchemaError, SchemaManager};
use crate::vector_index::{IndexedItem, VectorIndex, VectorIndexError};

use cache::TrainingCache;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("schema introspection failed: {0}")]
    Schema(#[from] SchemaError),
    #[error("vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),
}

/// Fraction of changed tables above which a full re-ingest is forced
/// instead of an incremental one (spec §4.3).
pub const FULL_INGEST_THRESHOLD: f64 = 0.2;

/// Caps from spec §4.3/§9: at most this many distinct values per column,
/// at most this many low-cardinality columns ingested per schema, each
/// DISTINCT probe bounded by this timeout.
pub const MAX_DISTINCT_VALUES: usize = 30;
pub const MAX_LOW_CARDINALITY_COLUMNS: usize = 50;
pub const DISTINCT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SchemaTrainer {
    vector_index: Arc<dyn VectorIndex>,
    sample_categorical_values: bool,
    process_discovery: Option<Arc<ProcessDiscovery>>,
    cache: TrainingCache,
}

impl SchemaTrainer {
    pub fn new(vector_index: Arc<dyn VectorIndex>) -> Self {
        Self { vector_index, sample_categorical_values: false, process_discovery: None, cache: TrainingCache::new() }
    }

    /// Enables categorical-value sampling: low-cardinality text/boolean
    /// columns are probed with `SELECT DISTINCT` via the executor passed
    /// into `ensure_trained` (spec §4.3, §9).
    pub fn with_categorical_sampling(mut self) -> Self {
        self.sample_categorical_values = true;
        self
    }

    /// Enables schema-time process discovery after a successful train
    /// (spec §4.11a).
    pub fn with_process_discovery(mut self, process_discovery: Arc<ProcessDiscovery>) -> Self {
        self.process_discovery = Some(process_discovery);
        self
    }

    /// Ensures `fingerprint`'s VectorIndex namespace reflects the live
    /// schema of `connection`, introspected via `schema_manager` and (if
    /// categorical sampling is enabled) probed via `executor`. Both are
    /// built by the caller per request since a `ConnectionConfig` is only
    /// known per call (spec §6). Idempotent: a second concurrent caller for
    /// the same fingerprint waits for the first caller's in-flight run to
    /// finish on the fingerprint's own lock, rather than re-training
    /// concurrently (spec §4.3, §5). A failed run does not update the
    /// trained snapshot.
    pub async fn ensure_trained(
        &self,
        fingerprint: Fingerprint,
        connection: &ConnectionConfig,
        schema_manager: &dyn SchemaManager,
        executor: Option<&dyn QueryExecutor>,
    ) -> Result<(), TrainingError> {
        let vector_index = &self.vector_index;
        let process_discovery = &self.process_discovery;
        let executor = if self.sample_categorical_values { executor } else { None };

        self.cache
            .with_exclusive_access(fingerprint, |old_snapshot| async move {
                let started = std::time::Instant::now();
                tracing::info!(%fingerprint, "schema training started");

                let result = train_one(schema_manager, vector_index, executor, process_discovery, fingerprint, connection, old_snapshot).await;

                match &result {
                    Ok(Some(_)) | Ok(None) => {
                        tracing::info!(%fingerprint, elapsed_ms = started.elapsed().as_millis() as u64, "schema training finished");
                    },
                    Err(err) => {
                        tracing::warn!(%fingerprint, error = %err, "schema training failed");
                    },
                }

                result
            })
            .await
    }

    pub fn is_trained(&self, fingerprint: Fingerprint) -> bool {
        self.cache.is_trained(fingerprint)
    }

    /// The categorical values sampled on `fingerprint`'s last successful
    /// training run, if categorical sampling is enabled and has run at
    /// least once (spec §4.3).
    pub fn categorical_values(&self, fingerprint: Fingerprint) -> Option<CategoricalValues> {
        self.cache.categorical_values(fingerprint)
    }
}

/// Standalone so it can be moved into the `with_exclusive_access` closure
/// without capturing `&SchemaTrainer` (the closure must be `'static`-free
/// of a borrow on `self.cache` while it itself is locked).
async fn train_one(
    schema_manager: &dyn SchemaManager,
    vector_index: &Arc<dyn VectorIndex>,
    executor: Option<&dyn QueryExecutor>,
    process_discovery: &Option<Arc<ProcessDiscovery>>,
    fingerprint: Fingerprint,
    connection: &ConnectionConfig,
    old_snapshot: Option<SchemaSnapshot>,
) -> Result<Option<(SchemaSnapshot, CategoricalValues)>, TrainingError> {
    let new_snapshot = schema_manager.snapshot(connection.schema.as_deref()).await?;

    let forced_full = match &old_snapshot {
        Some(old_snapshot) => {
            let diff = crate::models::diff(old_snapshot, &new_snapshot);
            if diff.is_empty() {
                return Ok(None);
            }
            diff.changed_fraction(new_snapshot.tables.len().max(1)) > FULL_INGEST_THRESHOLD
        },
        None => true,
    };

    let namespace = fingerprint.to_string();
    if forced_full {
        vector_index.delete(&namespace).await?;
    }

    let categorical_values = match executor {
        Some(executor) => sample_categorical_values(executor, connection.dialect, &new_snapshot).await,
        None => CategoricalValues::default(),
    };

    // Discovery runs before ingest so its findings can be folded into the
    // same retrieval namespace the generator later queries (spec §4.3, C11).
    let discovered_processes = match process_discovery {
        Some(process_discovery) => process_discovery.discover_for_schema(fingerprint, &new_snapshot, &categorical_values),
        None => Vec::new(),
    };

    let dialect_profile = dialect::for_dialect(connection.dialect);
    let items = ddl_items(&new_snapshot, &categorical_values, dialect_profile.as_ref(), &discovered_processes);
    vector_index.upsert(&namespace, items).await?;

    Ok(Some((new_snapshot, categorical_values)))
}

/// Probes every non-key text/boolean column with `SELECT DISTINCT` up to
/// `MAX_DISTINCT_VALUES + 1` rows, keeping only columns that come back at
/// or under the cap, and stopping once `MAX_LOW_CARDINALITY_COLUMNS`
/// columns have been captured (spec §4.3, §9). A failed or timed-out
/// probe is skipped rather than failing the whole training run.
async fn sample_categorical_values(executor: &dyn QueryExecutor, dialect: Dialect, snapshot: &SchemaSnapshot) -> CategoricalValues {
    let profile = dialect::for_dialect(dialect);
    let mut values = CategoricalValues::default();
    let mut captured = 0usize;

    'tables: for table in &snapshot.tables {
        for column in &table.columns {
            if captured >= MAX_LOW_CARDINALITY_COLUMNS {
                break 'tables;
            }
            if !matches!(column.data_type, crate::models::SemanticType::Text | crate::models::SemanticType::Boolean) || column.is_pk {
                continue;
            }

            let sql = SQLQuery {
                text: format!(
                    "SELECT DISTINCT {} FROM {} LIMIT {}",
                    profile.quote_identifier(&column.name),
                    profile.quote_identifier(&table.name),
                    MAX_DISTINCT_VALUES + 1
                ),
                dialect,
                generation_attempt: 0,
            };

            let cancel = CancellationToken::new();
            let timeout_guard = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DISTINCT_QUERY_TIMEOUT).await;
                timeout_guard.cancel();
            });

            let Ok(result) = executor.execute(&sql, MAX_DISTINCT_VALUES + 1, &cancel).await else { continue };
            if result.rows.len() > MAX_DISTINCT_VALUES {
                continue;
            }
            let distinct: std::collections::HashSet<String> = result.rows.into_iter().filter_map(|row| row.into_iter().next().flatten()).collect();
            if distinct.is_empty() {
                continue;
            }
            values.insert(&table.name, &column.name, distinct);
            captured += 1;
        }
    }

    values
}

/// Builds every item placed into a fingerprint's retrieval namespace:
/// table DDL (with comments and sampled values folded in), the dialect's
/// worked Q→SQL examples, its free-text documentation, a disambiguation
/// note over sampled categorical values, and a note per schema-time
/// process discovery (spec §4.3). Tagged with a `kind` so the generator
/// can partition one combined query into DDL/examples/documentation
/// sections instead of pulling any of this statically (spec §4.6 step 1).
fn ddl_items(
    snapshot: &SchemaSnapshot,
    categorical_values: &CategoricalValues,
    dialect_profile: &dyn DialectProfile,
    discovered_processes: &[DiscoveredProcess],
) -> Vec<IndexedItem> {
    let mut items = Vec::new();

    for table in &snapshot.tables {
        let columns = table
            .columns
            .iter()
            .map(|c| {
                let mut fragment = format!("{} {:?}{}", c.name, c.data_type, if c.is_pk { " PRIMARY KEY" } else { "" });
                if let Some(comment) = &c.comment {
                    fragment.push_str(&format!(" -- {comment}"));
                }
                if let Some(values) = categorical_values.get(&table.name, &c.name) {
                    let mut sample: Vec<&str> = values.iter().map(String::as_str).collect();
                    sample.sort_unstable();
                    fragment.push_str(&format!(" [{}]", sample.join(", ")));
                }
                fragment
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut text = format!("TABLE {} ({})", table.name, columns);
        if let Some(comment) = &table.comment {
            text.push_str(&format!(" -- {comment}"));
        }
        items.push(IndexedItem {
            id: format!("table:{}", table.name),
            text,
            metadata: serde_json::json!({ "kind": "table", "table": table.name }),
        });
    }

    for (idx, (question, sql)) in dialect_profile.example_queries().iter().enumerate() {
        items.push(IndexedItem {
            id: format!("example:{idx}"),
            text: format!("Q: {question}\nSQL: {sql}"),
            metadata: serde_json::json!({ "kind": "example", "question": question, "sql": sql }),
        });
    }

    let documentation_blob = dialect_profile.documentation_blob();
    if !documentation_blob.is_empty() {
        items.push(IndexedItem {
            id: "documentation".to_string(),
            text: documentation_blob.to_string(),
            metadata: serde_json::json!({ "kind": "doc" }),
        });
    }

    if !categorical_values.values.is_empty() {
        let mut notes: Vec<String> = categorical_values
            .values
            .iter()
            .map(|((table, column), values)| {
                let mut sorted: Vec<&String> = values.iter().collect();
                sorted.sort();
                format!("{table}.{column} only takes values: {}", sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
            })
            .collect();
        notes.sort();
        items.push(IndexedItem {
            id: "disambiguation".to_string(),
            text: notes.join("\n"),
            metadata: serde_json::json!({ "kind": "doc" }),
        });
    }

    for process in discovered_processes {
        let mut note = format!("Process `{}` centers on table `{}`", process.name, process.main_table);
        if let Some(status_column) = &process.status_column {
            note.push_str(&format!(", tracked via status column `{status_column}`"));
        }
        if let Some((from, to)) = &process.transition_pattern {
            note.push_str(&format!(", transitions recorded in `{from}`/`{to}`"));
        }
        note.push('.');
        items.push(IndexedItem {
            id: format!("process:{}", process.main_table),
            text: note,
            metadata: serde_json::json!({ "kind": "process" }),
        });
    }

    items
}
