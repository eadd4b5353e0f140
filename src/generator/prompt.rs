//! Structured prompt builder (spec §9), generalized from the pattern in
//! services/llm/scenarios/root_cause.rs of composing a prompt from named
//! sub-builders concatenated onto a base string.

use crate::models::CategoricalValues;

/// Named sections making up a single generation prompt. Kept explicit
/// (rather than ad hoc string concatenation) so the serializer is
/// unit-testable and diffable.
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    pub role: String,
    pub dialect_documentation: String,
    pub ddl: Vec<String>,
    pub examples: Vec<(String, String)>,
    pub documentation: Vec<String>,
    pub disambiguation: Vec<String>,
    pub prior_attempt: Option<PriorAttempt>,
    pub question: String,
}

#[derive(Debug, Clone)]
pub struct PriorAttempt {
    pub sql: String,
    pub feedback: String,
}

const ROLE_PROMPT: &str = "You translate a natural-language analytics question into a single read-only SQL query. Respond with exactly one SQL statement and nothing else.";

impl PromptSections {
    pub fn new(question: impl Into<String>, dialect_documentation: impl Into<String>) -> Self {
        Self {
            role: ROLE_PROMPT.to_string(),
            dialect_documentation: dialect_documentation.into(),
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_ddl(mut self, ddl: Vec<String>) -> Self {
        self.ddl = ddl;
        self
    }

    pub fn with_examples(mut self, examples: Vec<(String, String)>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_documentation(mut self, documentation: Vec<String>) -> Self {
        self.documentation = documentation;
        self
    }

    pub fn with_disambiguation(mut self, categorical_values: &CategoricalValues) -> Self {
        self.disambiguation = categorical_values
            .values
            .iter()
            .map(|((table, column), values)| {
                let mut sorted: Vec<&String> = values.iter().collect();
                sorted.sort();
                format!("{table}.{column} only takes values: {}", sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
            })
            .collect();
        self
    }

    pub fn with_prior_attempt(mut self, sql: impl Into<String>, feedback: impl Into<String>) -> Self {
        self.prior_attempt = Some(PriorAttempt { sql: sql.into(), feedback: feedback.into() });
        self
    }

    /// Deterministic serialization: section order never depends on
    /// iteration order of any collection passed in (spec §9).
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.role);
        out.push_str("\n\n# Dialect\n");
        out.push_str(&self.dialect_documentation);

        if !self.ddl.is_empty() {
            out.push_str("\n\n# Schema\n");
            for ddl in &self.ddl {
                out.push_str(ddl);
                out.push('\n');
            }
        }

        if !self.examples.is_empty() {
            out.push_str("\n# Examples\n");
            for (question, sql) in &self.examples {
                out.push_str(&format!("Q: {question}\nSQL: {sql}\n"));
            }
        }

        if !self.documentation.is_empty() {
            out.push_str("\n# Notes\n");
            for doc in &self.documentation {
                out.push_str(doc);
                out.push('\n');
            }
        }

        if !self.disambiguation.is_empty() {
            out.push_str("\n# Column values\n");
            for line in &self.disambiguation {
                out.push_str(line);
                out.push('\n');
            }
        }

        if let Some(prior) = &self.prior_attempt {
            out.push_str("\n# Prior attempt failed\n");
            out.push_str(&format!("SQL: {}\nError: {}\n", prior.sql, prior.feedback));
        }

        out.push_str("\n# Question\n");
        out.push_str(&self.question);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_deterministic_regardless_of_input_order() {
        let a = PromptSections::new("how many orders?", "postgres docs")
            .with_ddl(vec!["TABLE orders (id INTEGER)".to_string()]);
        let b = a.clone();
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn render_includes_prior_attempt_section_only_when_present() {
        let without = PromptSections::new("q", "docs").render();
        assert!(!without.contains("Prior attempt failed"));

        let with = PromptSections::new("q", "docs").with_prior_attempt("SELECT 1", "syntax error").render();
        assert!(with.contains("Prior attempt failed"));
        assert!(with.contains("SELECT 1"));
    }
}
