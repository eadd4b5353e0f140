//! HTTP surface: thin axum handlers over [`crate::PipelineEngine`].

pub mod describe;
pub mod query;

use serde::Deserialize;

use crate::models::{Credentials, Dialect};

/// Wire shape of a connection request. `ConnectionConfig` deliberately
/// doesn't derive `Deserialize` (its `Credentials` field shouldn't be
/// deserialized or logged carelessly), so requests come in as this DTO
/// and are mapped explicitly.
#[derive(Debug, Deserialize)]
pub struct ConnectionRequest {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub user: String,
    pub password: String,
}

impl From<ConnectionRequest> for crate::models::ConnectionConfig {
    fn from(request: ConnectionRequest) -> Self {
        Self {
            dialect: request.dialect,
            host: request.host,
            port: request.port,
            database: request.database,
            schema: request.schema,
            credentials: Credentials { user: request.user, password: request.password },
        }
    }
}

/// Maps a [`crate::error::PipelineError`] to an HTTP status (spec §7's
/// `friendly`/`diagnostic` split: callers see `friendly()`, logs see
/// `diagnostic()`).
pub fn status_for(error: &crate::error::PipelineError) -> axum::http::StatusCode {
    use axum::http::StatusCode;
    use crate::error::PipelineError::*;

    match error {
        ValidationRejected { .. } | GenerationRefusal | AttemptsExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Execution(err) => match err {
            crate::models::QueryError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            crate::models::QueryError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        },
        Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        SchemaIntrospectionFailed(_) | LlmTransportFailed(_) => StatusCode::BAD_GATEWAY,
        Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
