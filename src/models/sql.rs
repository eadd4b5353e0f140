//! SQLQuery, QueryResult, QueryError (spec §3).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::connection::Dialect;
use super::schema::SemanticType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SQLQuery {
    pub text: String,
    pub dialect: Dialect,
    pub generation_attempt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: SemanticType,
}

pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
    pub truncated: bool,
    pub row_count: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

impl QueryResult {
    /// Invariant (spec §8, property 5): `truncated ⟺ rows.len() == row_limit`.
    pub fn assert_row_cap_invariant(&self, row_limit: usize) {
        debug_assert!(self.rows.len() <= row_limit);
        debug_assert_eq!(self.truncated, self.rows.len() == row_limit);
    }
}

/// Which validator layer rejected a candidate (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLayerKind {
    Keyword,
    Pattern,
    Ast,
    Transpile,
}

/// Tagged union over execution/validation errors (spec §3).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum QueryError {
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("statement timed out: {0}")]
    Timeout(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("row limit exceeded")]
    RowLimitExceeded,
    #[error("model refused to answer")]
    Refusal,
    #[error("validation rejected at {layer:?}: {message}")]
    ValidationRejection { layer: ValidationLayerKind, message: String },
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyntaxError(_) => "execution_syntax",
            Self::UnknownIdentifier(_) => "execution_unknown_identifier",
            Self::TypeMismatch(_) => "execution_type_mismatch",
            Self::PermissionDenied(_) => "execution_permission_denied",
            Self::Timeout(_) => "execution_timeout",
            Self::ConnectionLost(_) => "execution_connection_lost",
            Self::RowLimitExceeded => "execution_row_limit_exceeded",
            Self::Refusal => "generation_refusal",
            Self::ValidationRejection { .. } => "validation_rejected",
        }
    }

    /// Whether the self-correction loop should retry on this error
    /// (spec §4.8: recoverable set is {SyntaxError, UnknownIdentifier, TypeMismatch}).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SyntaxError(_) | Self::UnknownIdentifier(_) | Self::TypeMismatch(_))
    }

    /// Correction-feedback line: error kind + normalized message, capped
    /// to a safe size (spec §4.8: truncated to 500 chars, no stack traces).
    pub fn as_feedback_line(&self) -> String {
        let message = self.to_string();
        let mut truncated: String = message.chars().take(500).collect();
        if truncated.len() < message.len() {
            truncated.push_str(" …");
        }
        format!("{}: {}", self.kind(), truncated)
    }
}
