//! Stable error taxonomy for the pipeline (spec §7).
//!
//! Every public operation returns one of the errors below instead of a
//! generic `anyhow::Error`, so a caller can match on `kind()` the same way
//! the external interface's `friendly`/`diagnostic` split promises.

use thiserror::Error;

use crate::models::sql::QueryError;
use crate::validator::ValidationRejection;

/// Terminal outcome of a single `PipelineCoordinator::process` call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("SQL validation failed at {layer:?}: {message}")]
    ValidationRejected { layer: crate::validator::ValidatorLayer, message: String },

    #[error("model declined to answer")]
    GenerationRefusal,

    #[error("query execution failed: {0}")]
    Execution(#[from] QueryError),

    #[error("self-correction exhausted after {attempts} attempts: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("schema introspection failed: {0}")]
    SchemaIntrospectionFailed(String),

    #[error("LLM transport failed: {0}")]
    LlmTransportFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable kind identifier, matching the strings named in spec §7.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationRejected { .. } => "validation_rejected",
            Self::GenerationRefusal => "generation_refusal",
            Self::Execution(err) => err.kind(),
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
            Self::Cancelled => "cancelled",
            Self::SchemaIntrospectionFailed(_) => "schema_introspection_failed",
            Self::LlmTransportFailed(_) => "llm_transport_failed",
            Self::Internal(_) => "internal",
        }
    }

    /// Message safe to show a user: no SQL text, no stack traces.
    pub fn friendly(&self) -> String {
        match self {
            Self::ValidationRejected { .. } => {
                "The generated query could not be validated as safe. Please rephrase your question.".to_string()
            },
            Self::GenerationRefusal => {
                "The assistant could not produce a query for that question.".to_string()
            },
            Self::Execution(QueryError::PermissionDenied(_)) => {
                "You don't have permission to access the data required for this question.".to_string()
            },
            Self::Execution(QueryError::ConnectionLost(_)) => {
                "Lost connection to the database. Please try again.".to_string()
            },
            Self::Execution(QueryError::Timeout(_)) => {
                "The query took too long to run. Try narrowing your question.".to_string()
            },
            Self::Execution(_) => "The query could not be executed.".to_string(),
            Self::AttemptsExhausted { .. } => {
                "Couldn't produce a working query after several attempts.".to_string()
            },
            Self::Cancelled => "Request cancelled.".to_string(),
            Self::SchemaIntrospectionFailed(_) => {
                "Could not read the database schema.".to_string()
            },
            Self::LlmTransportFailed(_) => {
                "The assistant service is currently unavailable.".to_string()
            },
            Self::Internal(_) => "An unexpected error occurred.".to_string(),
        }
    }

    /// Verbose message for logs; may contain SQL text and upstream detail.
    pub fn diagnostic(&self) -> String {
        format!("{self:?}")
    }
}

impl From<ValidationRejection> for PipelineError {
    fn from(rejection: ValidationRejection) -> Self {
        Self::ValidationRejected { layer: rejection.layer, message: rejection.message }
    }
}

pub type PipelineResultOutcome<T> = Result<T, PipelineError>;
