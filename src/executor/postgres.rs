//! PostgresExecutor (spec §4.9), backed by `tokio-postgres`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::pool::PoolManager;
use super::QueryExecutor;
use crate::models::{ColumnDescriptor, ConnectionConfig, QueryError, QueryResult, Row, SQLQuery, SemanticType};

pub struct PostgresExecutor {
    pool_manager: Arc<PoolManager>,
    connection: ConnectionConfig,
    statement_timeout: Duration,
}

impl PostgresExecutor {
    /// `pool_manager` is shared (one per process) so different requests
    /// against the same fingerprint reuse the same connection pool instead
    /// of each executor instance starting its own.
    pub fn new(pool_manager: Arc<PoolManager>, connection: ConnectionConfig, statement_timeout: Duration) -> Self {
        Self { pool_manager, connection, statement_timeout }
    }

    fn map_column_type(type_name: &str) -> SemanticType {
        match type_name {
            "int4" | "int8" | "int2" => SemanticType::Integer,
            "numeric" | "float4" | "float8" => SemanticType::Decimal,
            "bool" => SemanticType::Boolean,
            "timestamp" | "timestamptz" | "date" => SemanticType::Timestamp,
            "json" | "jsonb" => SemanticType::Json,
            "bytea" => SemanticType::Binary,
            _ => SemanticType::Text,
        }
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, sql: &SQLQuery, row_limit: usize, cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        let started = Instant::now();

        let client = self
            .pool_manager
            .checkout(&self.connection)
            .await
            .map_err(|e| QueryError::ConnectionLost(e.to_string()))?;

        let query_future = client.query_raw(&sql.text, Vec::<String>::new());

        let rows_stream = tokio::select! {
            result = tokio::time::timeout(self.statement_timeout, query_future) => {
                result.map_err(|_| QueryError::Timeout(format!("statement exceeded {:?}", self.statement_timeout)))?
                    .map_err(map_pg_error)?
            },
            _ = cancel.cancelled() => return Err(QueryError::ConnectionLost("request cancelled".to_string())),
        };

        use futures_util::pin_mut;
        use futures_util::stream::StreamExt;
        pin_mut!(rows_stream);

        let mut columns: Option<Vec<ColumnDescriptor>> = None;
        let mut out_rows: Vec<Row> = Vec::new();
        let mut truncated = false;

        loop {
            if cancel.is_cancelled() {
                return Err(QueryError::ConnectionLost("request cancelled".to_string()));
            }
            if out_rows.len() >= row_limit {
                truncated = true;
                break;
            }
            match rows_stream.next().await {
                Some(Ok(row)) => {
                    if columns.is_none() {
                        columns = Some(
                            row.columns()
                                .iter()
                                .map(|c| ColumnDescriptor { name: c.name().to_string(), data_type: Self::map_column_type(c.type_().name()) })
                                .collect(),
                        );
                    }
                    let values: Row = (0..row.len()).map(|idx| row.try_get::<_, Option<String>>(idx).ok().flatten()).collect();
                    out_rows.push(values);
                },
                Some(Err(e)) => return Err(map_pg_error(e)),
                None => break,
            }
        }

        let row_count = out_rows.len();
        Ok(QueryResult {
            columns: columns.unwrap_or_default(),
            rows: out_rows,
            truncated,
            row_count,
            elapsed: started.elapsed(),
        })
    }
}

fn map_pg_error(err: tokio_postgres::Error) -> QueryError {
    if let Some(db_error) = err.as_db_error() {
        use tokio_postgres::error::SqlState;
        return match *db_error.code() {
            SqlState::SYNTAX_ERROR => QueryError::SyntaxError(db_error.message().to_string()),
            SqlState::UNDEFINED_COLUMN | SqlState::UNDEFINED_TABLE => QueryError::UnknownIdentifier(db_error.message().to_string()),
            SqlState::DATATYPE_MISMATCH | SqlState::INVALID_TEXT_REPRESENTATION => QueryError::TypeMismatch(db_error.message().to_string()),
            SqlState::INSUFFICIENT_PRIVILEGE => QueryError::PermissionDenied(db_error.message().to_string()),
            _ => QueryError::ConnectionLost(db_error.message().to_string()),
        };
    }
    QueryError::ConnectionLost(err.to_string())
}
