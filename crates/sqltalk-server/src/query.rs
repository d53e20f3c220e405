//! POST /query: one natural-language prompt, one pipeline run

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use sqltalk_core::{PipelineError, QueryRequest, QueryResult};
use std::time::Instant;
use tracing::{info_span, Instrument, Level};
use uuid::Uuid;

use crate::http::AppState;
use crate::metrics::Outcome;

/// Always answers 200; failures travel as `{"error": ...}`
pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Json<QueryResult> {
    let request_id = Uuid::new_v4();
    let span = info_span!("query", %request_id);

    async move {
        let started = Instant::now();
        let result = match payload {
            Ok(Json(request)) => state.pipeline.run_request(request).await,
            Err(rejection) => Err(PipelineError::InvalidRequest(rejection.body_text())),
        };
        let elapsed = started.elapsed();

        state.metrics.observe(&result, elapsed);
        crate::log_event!(
            level: Level::INFO,
            event: "query_completed",
            outcome: Outcome::of(&result).as_str(),
            duration_ms: elapsed.as_millis(),
        );

        Json(QueryResult::from(result))
    }
    .instrument(span)
    .await
}
