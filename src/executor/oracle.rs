//! OracleExecutor (spec §4.9), backed by the `oracle` crate (OCI
//! bindings). Compiled only with the `oracle-driver` feature.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::QueryExecutor;
use crate::models::{ColumnDescriptor, ConnectionConfig, QueryError, QueryResult, Row, SQLQuery, SemanticType};

pub struct OracleExecutor {
    connection: Arc<Mutex<oracle::Connection>>,
    statement_timeout: Duration,
}

impl OracleExecutor {
    /// Wraps an existing, possibly shared, OCI connection (e.g. one also
    /// used by an `OracleSchemaManager` for the same fingerprint).
    pub fn new(connection: Arc<Mutex<oracle::Connection>>, statement_timeout: Duration) -> Self {
        Self { connection, statement_timeout }
    }

    pub fn connect(config: &ConnectionConfig, statement_timeout: Duration) -> Result<Self, QueryError> {
        let connect_string = format!("{}:{}/{}", config.host, config.port, config.database);
        let connection = oracle::Connection::connect(&config.credentials.user, &config.credentials.password, connect_string)
            .map_err(|e| QueryError::ConnectionLost(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(connection)), statement_timeout))
    }

    fn map_column_type(type_info: &oracle::sql_type::OracleType) -> SemanticType {
        use oracle::sql_type::OracleType::*;
        match type_info {
            Number(_, _) | Float(_) | BinaryDouble | BinaryFloat => SemanticType::Decimal,
            Date | Timestamp(_) | TimestampTZ(_) => SemanticType::Timestamp,
            Blob | Raw(_) => SemanticType::Binary,
            _ => SemanticType::Text,
        }
    }
}

#[async_trait]
impl QueryExecutor for OracleExecutor {
    async fn execute(&self, sql: &SQLQuery, row_limit: usize, cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        let started = Instant::now();
        let connection = self.connection.clone();
        let statement_text = sql.text.clone();
        let timeout = self.statement_timeout;

        let blocking_task = tokio::task::spawn_blocking(move || -> Result<QueryResult, QueryError> {
            let connection = connection.lock().unwrap_or_else(|e| e.into_inner());
            let rows = connection.query(&statement_text, &[]).map_err(map_oracle_error)?;

            let columns: Vec<ColumnDescriptor> = rows
                .column_info()
                .iter()
                .map(|c| ColumnDescriptor { name: c.name().to_string(), data_type: OracleExecutor::map_column_type(c.oracle_type()) })
                .collect();

            let mut out_rows = Vec::new();
            let mut truncated = false;
            for row_result in rows {
                if out_rows.len() >= row_limit {
                    truncated = true;
                    break;
                }
                let row = row_result.map_err(map_oracle_error)?;
                let values: Row = (0..columns.len()).map(|idx| row.get::<_, Option<String>>(idx).ok().flatten()).collect();
                out_rows.push(values);
            }

            let row_count = out_rows.len();
            Ok(QueryResult { columns, rows: out_rows, truncated, row_count, elapsed: started.elapsed() })
        });

        tokio::select! {
            result = tokio::time::timeout(timeout, blocking_task) => {
                result.map_err(|_| QueryError::Timeout(format!("statement exceeded {timeout:?}")))?
                    .map_err(|e| QueryError::ConnectionLost(e.to_string()))?
            },
            _ = cancel.cancelled() => Err(QueryError::ConnectionLost("request cancelled".to_string())),
        }
    }
}

fn map_oracle_error(err: oracle::Error) -> QueryError {
    match &err {
        oracle::Error::OciError(oci) => match oci.code() {
            942 => QueryError::UnknownIdentifier(err.to_string()),
            1017 | 1031 => QueryError::PermissionDenied(err.to_string()),
            904 => QueryError::UnknownIdentifier(err.to_string()),
            932 => QueryError::TypeMismatch(err.to_string()),
            900..=999 => QueryError::SyntaxError(err.to_string()),
            _ => QueryError::ConnectionLost(err.to_string()),
        },
        _ => QueryError::ConnectionLost(err.to_string()),
    }
}
