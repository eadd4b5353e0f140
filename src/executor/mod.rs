//! QueryExecutor (C9): runs validated SQL against the live database
//! (spec §4.9).

#[cfg(feature = "oracle-driver")]
pub mod oracle;
pub mod pool;
pub mod postgres;

#[cfg(feature = "oracle-driver")]
pub use oracle::OracleExecutor;
pub use postgres::PostgresExecutor;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::models::{QueryError, QueryResult, SQLQuery};

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `sql`, capping the materialized result at `row_limit` rows
    /// and setting `truncated = true` the instant the cap is hit without
    /// discarding already-fetched rows (spec §4.9).
    async fn execute(&self, sql: &SQLQuery, row_limit: usize, cancel: &CancellationToken) -> Result<QueryResult, QueryError>;
}
