//! `POST /api/query`: runs one natural-language question to a terminal
//! `PipelineResult` (spec §6).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::AppState;

use super::ConnectionRequest;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub connection: ConnectionRequest,
}

pub async fn run_query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> impl IntoResponse {
    let connection = request.connection.into();
    let cancel = CancellationToken::new();

    match state.pipeline.process(&request.question, &connection, &cancel).await {
        Ok(result) => (axum::http::StatusCode::OK, Json(result)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error.diagnostic(), "pipeline request failed");
            let status = super::status_for(&error);
            (status, Json(serde_json::json!({ "error": error.kind(), "message": error.friendly() }))).into_response()
        },
    }
}
