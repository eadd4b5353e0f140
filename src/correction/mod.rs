//! SelfCorrectionLoop (C8): bounded retry over generate → validate →
//! execute (spec §4.8).

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dialect::DialectProfile;
use crate::executor::QueryExecutor;
use crate::generator::{GenerationError, GenerationRequest, SQLGenerator};
use crate::models::{CategoricalValues, QueryError, QueryResult, SQLQuery};
use crate::PipelineError;
use crate::validator::{self, ValidationRejection};

/// Errors that terminate the loop immediately without consuming another
/// attempt (spec §4.8): these are never the generator's fault.
fn is_terminal(error: &QueryError) -> bool {
    matches!(error, QueryError::PermissionDenied(_) | QueryError::ConnectionLost(_) | QueryError::Timeout(_))
}

pub struct CorrectionOutcome {
    pub sql: SQLQuery,
    pub result: QueryResult,
    pub attempts: Vec<crate::models::AttemptRecord>,
}

/// A connection's executor is only known per request (spec §6's
/// `process(question, cfg, cancel)` takes a fresh `ConnectionConfig` every
/// call), so it is passed into [`SelfCorrectionLoop::run`] rather than
/// fixed at construction like the generator is.
pub struct SelfCorrectionLoop {
    generator: Arc<SQLGenerator>,
    max_attempts: u32,
}

impl SelfCorrectionLoop {
    pub fn new(generator: Arc<SQLGenerator>, max_attempts: u32) -> Self {
        Self { generator, max_attempts }
    }

    pub async fn run(
        &self,
        question: &str,
        fingerprint_namespace: &str,
        categorical_values: Option<&CategoricalValues>,
        dialect_profile: &dyn DialectProfile,
        executor: &dyn QueryExecutor,
        row_limit: usize,
        cancel: &CancellationToken,
    ) -> Result<CorrectionOutcome, PipelineError> {
        let mut attempts = Vec::new();
        let mut prior_attempt: Option<(String, String)> = None;

        for attempt_index in 0..self.max_attempts {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let request = GenerationRequest {
                question,
                fingerprint_namespace,
                attempt_index,
                categorical_values,
                prior_attempt: prior_attempt.as_ref().map(|(sql, feedback)| (sql.as_str(), feedback.as_str())),
            };

            let sql = match self.generator.generate(dialect_profile, request).await {
                Ok(sql) => sql,
                Err(GenerationError::Refusal) => {
                    // spec §4.8 step 2: a refusal consumes an attempt but
                    // must not terminate the pipeline — the next attempt
                    // goes out context-free rather than as a correction.
                    let placeholder = SQLQuery { text: String::new(), dialect: dialect_profile.dialect(), generation_attempt: attempt_index };
                    attempts.push(crate::models::AttemptRecord {
                        attempt: attempt_index,
                        sql: placeholder,
                        error: Some("model declined to answer (refusal)".to_string()),
                    });
                    prior_attempt = None;
                    continue;
                },
                Err(GenerationError::Llm(err)) => return Err(PipelineError::LlmTransportFailed(err.to_string())),
            };

            let validated_sql = match validator::validate(&sql.text, dialect_profile) {
                Ok(rewritten) => rewritten,
                Err(ValidationRejection { layer, message }) => {
                    attempts.push(crate::models::AttemptRecord { attempt: attempt_index, sql: sql.clone(), error: Some(message.clone()) });
                    prior_attempt = Some((sql.text.clone(), format!("validation_rejected at {layer:?}: {message}")));
                    continue;
                },
            };

            let mut sql = sql;
            sql.text = validated_sql;

            match executor.execute(&sql, row_limit, cancel).await {
                Ok(result) => {
                    attempts.push(crate::models::AttemptRecord { attempt: attempt_index, sql: sql.clone(), error: None });
                    return Ok(CorrectionOutcome { sql, result, attempts });
                },
                Err(error) if is_terminal(&error) => {
                    return Err(PipelineError::Execution(error));
                },
                Err(error) => {
                    let feedback = error.as_feedback_line();
                    attempts.push(crate::models::AttemptRecord { attempt: attempt_index, sql: sql.clone(), error: Some(feedback.clone()) });
                    prior_attempt = Some((sql.text.clone(), feedback));
                },
            }
        }

        let last_error = attempts.last().and_then(|a| a.error.clone()).unwrap_or_else(|| "no attempts recorded".to_string());
        Err(PipelineError::AttemptsExhausted { attempts: self.max_attempts, last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect;
    use crate::generator::SQLGenerator;
    use crate::llm::{ChatMessage, CompletionOptions, LLMClient, LLMError, LLMService, StreamChunk};
    use crate::models::{ColumnDescriptor, Dialect, QueryError, QueryResult, SemanticType};
    use crate::vector_index::InMemoryVectorIndex;
    use async_trait::async_trait;
    use futures_util::stream::{self, BoxStream};
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Refuses on its first call, then answers plainly — models a model
    /// that declines once before a context-free retry succeeds (spec §4.8
    /// scenario S5).
    struct RefusesOnceClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMClient for RefusesOnceClient {
        async fn complete(&self, _messages: &[ChatMessage], _options: &CompletionOptions) -> Result<String, LLMError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok("I can't help with that request.".to_string())
            } else {
                Ok("SELECT id FROM orders".to_string())
            }
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

    struct StubExecutor;

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(&self, _sql: &SQLQuery, _row_limit: usize, _cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
            Ok(QueryResult {
                columns: vec![ColumnDescriptor { name: "id".to_string(), data_type: SemanticType::Integer }],
                rows: vec![vec![Some("1".to_string())]],
                truncated: false,
                row_count: 1,
                elapsed: Duration::from_millis(1),
            })
        }
    }

    #[tokio::test]
    async fn refusal_consumes_an_attempt_and_continues_rather_than_aborting() {
        let client = Arc::new(RefusesOnceClient { calls: AtomicUsize::new(0) });
        let llm = Arc::new(LLMService::new(client, None));
        let vector_index = Arc::new(InMemoryVectorIndex::new());
        let generator = Arc::new(SQLGenerator::new(vector_index, llm, 5, 3, 0.0, 0.2));
        let loop_ = SelfCorrectionLoop::new(generator, 3);

        let dialect_profile = dialect::for_dialect(Dialect::Postgres);
        let executor = StubExecutor;
        let cancel = CancellationToken::new();

        let outcome = loop_
            .run("how many orders?", "fp-test", None, dialect_profile.as_ref(), &executor, 100, &cancel)
            .await
            .expect("a refusal on attempt 1 must not abort the request");

        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts[0].sql.text.is_empty());
        assert!(outcome.attempts[0].error.as_deref().unwrap_or_default().contains("refusal"));
        assert!(outcome.attempts[1].error.is_none());
    }
}
