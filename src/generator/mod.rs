//! SQLGenerator (C6): retrieval-augmented SQL generation (spec §4.6).

pub mod extract;
pub mod prompt;

use std::sync::Arc;
use thiserror::Error;

use crate::dialect::DialectProfile;
use crate::llm::{ChatMessage, CompletionOptions, LLMError, LLMService};
use crate::models::{CategoricalValues, Dialect, SQLQuery};
use crate::vector_index::VectorIndex;

use extract::extract;
use prompt::PromptSections;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM transport failed: {0}")]
    Llm(#[from] LLMError),
    #[error("model declined to answer")]
    Refusal,
}

pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub fingerprint_namespace: &'a str,
    pub attempt_index: u32,
    pub categorical_values: Option<&'a CategoricalValues>,
    pub prior_attempt: Option<(&'a str, &'a str)>,
}

/// Documentation/process notes retrieved per generation call, on top of
/// whatever DDL/example budget is configured (spec §4.3, §4.6).
const RETRIEVAL_K_DOCUMENTATION: usize = 5;

pub struct SQLGenerator {
    vector_index: Arc<dyn VectorIndex>,
    llm: Arc<LLMService>,
    retrieval_k_ddl: usize,
    retrieval_k_examples: usize,
    temperature_initial: f64,
    temperature_retry_delta: f64,
}

impl SQLGenerator {
    pub fn new(
        vector_index: Arc<dyn VectorIndex>,
        llm: Arc<LLMService>,
        retrieval_k_ddl: usize,
        retrieval_k_examples: usize,
        temperature_initial: f64,
        temperature_retry_delta: f64,
    ) -> Self {
        Self { vector_index, llm, retrieval_k_ddl, retrieval_k_examples, temperature_initial, temperature_retry_delta }
    }

    pub async fn generate(
        &self,
        dialect_profile: &dyn DialectProfile,
        request: GenerationRequest<'_>,
    ) -> Result<SQLQuery, GenerationError> {
        // Step 1 of spec §4.6 is a single retrieval over the fingerprint's
        // namespace; DDL, worked examples, and documentation are all
        // indexed items there (training/mod.rs's `ddl_items`), tagged with
        // a `kind` so one query can be partitioned into each prompt
        // section instead of pulling any of this statically.
        let total_k = self.retrieval_k_ddl + self.retrieval_k_examples + RETRIEVAL_K_DOCUMENTATION;
        let hits = self.vector_index.query(request.fingerprint_namespace, request.question, total_k).await.unwrap_or_default();

        let mut ddl = Vec::new();
        let mut examples = Vec::new();
        let mut documentation = Vec::new();
        for hit in hits {
            let kind = hit.item.metadata.get("kind").and_then(|v| v.as_str()).unwrap_or("table");
            match kind {
                "table" if ddl.len() < self.retrieval_k_ddl => ddl.push(hit.item.text),
                "example" if examples.len() < self.retrieval_k_examples => {
                    let question = hit.item.metadata.get("question").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let sql = hit.item.metadata.get("sql").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    examples.push((question, sql));
                },
                "doc" | "process" if documentation.len() < RETRIEVAL_K_DOCUMENTATION => documentation.push(hit.item.text),
                _ => {},
            }
        }

        let mut sections = PromptSections::new(request.question, dialect_profile.transpile_target_name())
            .with_ddl(ddl)
            .with_examples(examples)
            .with_documentation(documentation);

        if let Some(categorical_values) = request.categorical_values {
            sections = sections.with_disambiguation(categorical_values);
        }
        if let Some((sql, feedback)) = request.prior_attempt {
            sections = sections.with_prior_attempt(sql, feedback);
        }

        let temperature = self.temperature_initial + request.attempt_index as f64 * self.temperature_retry_delta;
        let options = CompletionOptions { temperature, ..Default::default() };
        let messages = vec![ChatMessage::system(sections.role.clone()), ChatMessage::user(sections.render())];

        let raw = self.llm.complete_cached(&messages, &options).await?;
        let extracted = extract(&raw);
        if extracted.refused {
            return Err(GenerationError::Refusal);
        }

        let rewritten = dialect_profile.rewrite_bind_variables(&extracted.sql);

        Ok(SQLQuery { text: rewritten, dialect: dialect_profile.dialect(), generation_attempt: request.attempt_index })
    }
}

/// Convenience for tests and callers that only have a `Dialect`, not a
/// live profile instance.
pub fn dialect_profile_for(dialect: Dialect) -> Box<dyn DialectProfile> {
    crate::dialect::for_dialect(dialect)
}
