//! `POST /api/query/describe`: streams a natural-language description of
//! an already-materialized `PipelineResult` over SSE (spec §6).

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::models::PipelineResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DescribeRequest {
    pub question: String,
    pub result: PipelineResult,
}

pub async fn describe_result(State(state): State<AppState>, Json(request): Json<DescribeRequest>) -> impl IntoResponse {
    let cancel = CancellationToken::new();
    let stream = state
        .pipeline
        .describe(&request.result, &request.question, cancel)
        .map(|chunk| -> Result<Event, Infallible> {
            match chunk {
                Ok(delta) => Ok(Event::default().data(delta)),
                Err(e) => Ok(Event::default().event("error").data(e.to_string())),
            }
        });

    Sse::new(stream)
}
