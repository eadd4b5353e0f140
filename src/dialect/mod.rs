//! DialectProfile: per-dialect SQL quirks consumed by the generator and
//! validator (spec §4.1).

mod oracle;
mod postgres;

pub use oracle::OracleProfile;
pub use postgres::PostgresProfile;

use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::Dialect;

#[derive(Debug, Error)]
pub enum DialectError {
    #[error("unknown dialect: {0}")]
    UnknownDialect(String),
}

/// Per-dialect facts the rest of the pipeline needs but must never hardcode.
pub trait DialectProfile: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Clause appended to a query to cap the result set to `n` rows.
    fn pagination_clause(&self, n: u64) -> String;

    /// Worked `(question, sql)` examples seeded into the retrieval index.
    fn example_queries(&self) -> &[(&'static str, &'static str)];

    /// Pattern matching this dialect's bind-variable syntax (e.g. `:name`
    /// for Oracle, `$1` for Postgres).
    fn bind_variable_shape(&self) -> &Regex;

    /// Rewrites bind markers to quoted string literals so the validator
    /// never has to special-case them (spec §4.6 step 5).
    fn rewrite_bind_variables(&self, sql: &str) -> String {
        self.bind_variable_shape().replace_all(sql, "'?'").into_owned()
    }

    /// Free-text dialect documentation injected into the prompt (§9).
    fn documentation_blob(&self) -> &str;

    /// Name `sqlparser` uses for this dialect's AST/Display behavior.
    fn transpile_target_name(&self) -> &'static str;

    fn reserved_keywords(&self) -> &HashSet<&'static str>;

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String;
}

pub fn for_name(name: &str) -> Result<Box<dyn DialectProfile>, DialectError> {
    match name.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(Box::new(PostgresProfile::new())),
        "oracle" => Ok(Box::new(OracleProfile::new())),
        other => Err(DialectError::UnknownDialect(other.to_string())),
    }
}

pub fn for_dialect(dialect: Dialect) -> Box<dyn DialectProfile> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresProfile::new()),
        Dialect::Oracle => Box::new(OracleProfile::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_name_rejects_unknown_dialect() {
        assert!(for_name("mssql").is_err());
    }

    #[test]
    fn for_name_is_case_insensitive() {
        assert!(for_name("POSTGRES").is_ok());
    }
}
