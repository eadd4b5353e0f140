//! Concrete end-to-end scenarios (spec §8, S1-S6). Drives
//! `SelfCorrectionLoop` through a mock `LLMClient`/`QueryExecutor` pair —
//! the same harness shape as `correction::tests` — then feeds the
//! materialized result through `chart::recommend`/`process::builder` the
//! way `PipelineEngine::process` does, without needing a live database.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use nl2sql_engine::correction::SelfCorrectionLoop;
use nl2sql_engine::dialect;
use nl2sql_engine::executor::QueryExecutor;
use nl2sql_engine::generator::SQLGenerator;
use nl2sql_engine::llm::{ChatMessage, CompletionOptions, LLMClient, LLMError, LLMService, StreamChunk};
use nl2sql_engine::models::{ChartType, ColorPolicy, ColumnDescriptor, Dialect, QueryError, QueryResult, SQLQuery, SemanticType};
use nl2sql_engine::process;
use nl2sql_engine::vector_index::InMemoryVectorIndex;

fn column(name: &str, data_type: SemanticType) -> ColumnDescriptor {
    ColumnDescriptor { name: name.to_string(), data_type }
}

fn result(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Option<&str>>>) -> QueryResult {
    let rows: Vec<Vec<Option<String>>> = rows.into_iter().map(|r| r.into_iter().map(|v| v.map(str::to_string)).collect()).collect();
    let row_count = rows.len();
    QueryResult { columns, rows, truncated: false, row_count, elapsed: Duration::from_millis(1) }
}

fn loop_with(client: Arc<dyn LLMClient>) -> SelfCorrectionLoop {
    let llm = Arc::new(LLMService::new(client, None));
    let vector_index = Arc::new(InMemoryVectorIndex::new());
    let generator = Arc::new(SQLGenerator::new(vector_index, llm, 5, 3, 0.0, 0.2));
    SelfCorrectionLoop::new(generator, 3)
}

/// Replays a fixed sequence of raw completions, one per call; panics if
/// exhausted, which would mean a scenario needed more attempts than it
/// claims to need.
struct ScriptedClient {
    responses: Mutex<Vec<String>>,
    sent_prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(responses: Vec<&str>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().map(str::to_string).collect()), sent_prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage], _options: &CompletionOptions) -> Result<String, LLMError> {
        if let Some(user_message) = messages.iter().find(|m| m.role == "user") {
            self.sent_prompts.lock().unwrap().push(user_message.content.clone());
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("scripted client exhausted its responses");
        }
        Ok(responses.remove(0))
    }

    async fn stream(&self, _messages: &[ChatMessage], _options: &CompletionOptions, _cancel: CancellationToken) -> BoxStream<'static, Result<StreamChunk, LLMError>> {
        stream::empty().boxed()
    }
}

/// Always succeeds with one row; S1/S2's scenarios never need a
/// correction cycle on the executor side.
struct FixedExecutor(QueryResult);

#[async_trait]
impl QueryExecutor for FixedExecutor {
    async fn execute(&self, _sql: &SQLQuery, _row_limit: usize, _cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        Ok(self.0.clone())
    }
}

/// Fails with `UnknownIdentifier` until the candidate SQL references
/// `created_at` instead of `created` (S4).
struct UnknownColumnExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl QueryExecutor for UnknownColumnExecutor {
    async fn execute(&self, sql: &SQLQuery, _row_limit: usize, _cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sql.text.contains("created_at") {
            Ok(result(vec![column("created_at", SemanticType::Timestamp)], vec![vec![Some("2026-01-01")]]))
        } else {
            Err(QueryError::UnknownIdentifier("column 'created' not found; did you mean 'created_at'?".to_string()))
        }
    }
}

#[tokio::test]
async fn s1_happy_path_aggregation_is_one_attempt_and_recommends_bar() {
    let client = Arc::new(ScriptedClient::new(vec!["```sql\nSELECT country, COUNT(*) FROM customers GROUP BY country\n```"]));
    let loop_ = loop_with(client);
    let dialect_profile = dialect::for_dialect(Dialect::Postgres);
    let executor = FixedExecutor(result(
        vec![column("country", SemanticType::Text), column("count", SemanticType::Integer)],
        vec![vec![Some("US"), Some("12")], vec![Some("DE"), Some("3")]],
    ));
    let cancel = CancellationToken::new();

    let outcome = loop_.run("How many customers per country?", "fp-s1", None, dialect_profile.as_ref(), &executor, 1000, &cancel).await.expect("s1 must succeed");

    assert_eq!(outcome.attempts.len(), 1);
    assert!(outcome.sql.text.contains("GROUP BY country"));
    assert!(process::builder::build(&outcome.result, None).is_none(), "a plain country/count result has no process shape");

    let chart_spec = nl2sql_engine::chart::recommend(&outcome.result, "How many customers per country?", None).await;
    assert_eq!(chart_spec.chart_type, ChartType::Bar);
    assert_eq!(chart_spec.x_field.as_deref(), Some("country"));
    assert_eq!(chart_spec.color_policy, ColorPolicy::Categorical);
}

#[tokio::test]
async fn s2_oracle_transpile_rewrites_limit_to_fetch_first() {
    let client = Arc::new(ScriptedClient::new(vec!["```sql\nSELECT name, SUM(price*qty) r FROM products GROUP BY name ORDER BY r DESC LIMIT 10\n```"]));
    let loop_ = loop_with(client);
    let dialect_profile = dialect::for_dialect(Dialect::Oracle);
    let executor = FixedExecutor(result(vec![column("name", SemanticType::Text), column("r", SemanticType::Decimal)], vec![vec![Some("widget"), Some("99.5")]]));
    let cancel = CancellationToken::new();

    let outcome = loop_.run("Top 10 products by revenue", "fp-s2", None, dialect_profile.as_ref(), &executor, 1000, &cancel).await.expect("s2 must succeed");

    assert_eq!(outcome.attempts.len(), 1);
    assert!(outcome.sql.text.to_uppercase().contains("FETCH FIRST 10 ROWS ONLY"));
    assert!(!outcome.sql.text.to_uppercase().contains("LIMIT"));
}

#[tokio::test]
async fn s3_update_is_rejected_then_a_select_succeeds() {
    let client = Arc::new(ScriptedClient::new(vec!["```sql\nUPDATE users SET banned = true\n```", "```sql\nSELECT id FROM users\n```"]));
    let loop_ = loop_with(client);
    let dialect_profile = dialect::for_dialect(Dialect::Postgres);
    let executor = FixedExecutor(result(vec![column("id", SemanticType::Integer)], vec![vec![Some("1")]]));
    let cancel = CancellationToken::new();

    let outcome = loop_.run("Ban every user", "fp-s3", None, dialect_profile.as_ref(), &executor, 1000, &cancel).await.expect("s3 must recover");

    assert!(outcome.attempts.len() >= 2);
    assert!(outcome.attempts[0].error.as_deref().unwrap_or_default().contains("disallowed keyword"));
    assert!(outcome.attempts.last().unwrap().error.is_none());
}

#[tokio::test]
async fn s4_unknown_column_correction_records_both_attempts() {
    let client = Arc::new(ScriptedClient::new(vec!["```sql\nSELECT created FROM orders\n```", "```sql\nSELECT created_at FROM orders\n```"]));
    let loop_ = loop_with(client);
    let dialect_profile = dialect::for_dialect(Dialect::Postgres);
    let executor = UnknownColumnExecutor { calls: AtomicUsize::new(0) };
    let cancel = CancellationToken::new();

    let outcome = loop_.run("When was the order created?", "fp-s4", None, dialect_profile.as_ref(), &executor, 1000, &cancel).await.expect("s4 must recover");

    assert_eq!(outcome.attempts.len(), 2);
    assert!(outcome.attempts[0].error.as_deref().unwrap_or_default().contains("created"));
    assert!(outcome.attempts[1].error.is_none());
    assert!(outcome.sql.text.contains("created_at"));
}

#[tokio::test]
async fn s5_refusal_is_followed_by_a_context_free_regeneration() {
    let client = Arc::new(ScriptedClient::new(vec!["I can't help with that.", "```sql\nSELECT id FROM orders\n```"]));
    let loop_ = loop_with(client.clone());
    let dialect_profile = dialect::for_dialect(Dialect::Postgres);
    let executor = FixedExecutor(result(vec![column("id", SemanticType::Integer)], vec![vec![Some("1")]]));
    let cancel = CancellationToken::new();

    let outcome = loop_.run("List something dubious", "fp-s5", None, dialect_profile.as_ref(), &executor, 1000, &cancel).await.expect("s5 must recover from a refusal");

    assert_eq!(outcome.attempts.len(), 2);
    assert!(outcome.attempts[0].sql.text.is_empty());
    assert!(outcome.attempts[1].error.is_none());

    let prompts = client.sent_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[1].contains("Prior attempt failed"));
}

#[tokio::test]
async fn s6_transition_result_detects_process_and_recommends_bar() {
    let r = result(
        vec![
            column("from_status", SemanticType::Text),
            column("to_status", SemanticType::Text),
            column("count", SemanticType::Integer),
            column("avg_duration_min", SemanticType::Decimal),
        ],
        vec![
            vec![Some("created"), Some("paid"), Some("120"), Some("5.2")],
            vec![Some("paid"), Some("shipped"), Some("115"), Some("1440")],
            vec![Some("shipped"), Some("delivered"), Some("110"), Some("2880")],
        ],
    );

    let flow = process::builder::build(&r, None).expect("s6 transition shape must build a flow");
    assert_eq!(flow.nodes.len(), 4);
    assert_eq!(flow.edges.len(), 3);
    let bottleneck = flow.edges[flow.bottleneck_edge.expect("a duration-bearing bottleneck must exist")].clone();
    assert_eq!(bottleneck.from, "shipped");
    assert_eq!(bottleneck.to, "delivered");
    assert_eq!(flow.layout_direction, nl2sql_engine::models::LayoutDirection::LeftToRight);

    let chart_spec = nl2sql_engine::chart::recommend(&r, "how do orders flow through statuses?", None).await;
    assert_eq!(chart_spec.chart_type, ChartType::Bar);
    assert_eq!(chart_spec.color_policy, ColorPolicy::Semantic);
}
