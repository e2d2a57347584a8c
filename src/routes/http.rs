// Handlers: health, version, current snapshot, history range, bulk ingest

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::cache;
use crate::error::PipelineError;
use crate::health;
use crate::models::{CurrentContainer, IngestEntry, NewRecord};
use crate::version::{NAME, VERSION};

const DEFAULT_HISTORY_HOURS: u32 = 24;
const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Error body for handlers: `{"error": "..."}` with the given status.
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

fn unavailable(operation: &'static str, e: impl std::fmt::Display) -> ApiError {
    tracing::warn!(error = %e, operation, "request failed");
    ApiError(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

/// GET /version: service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /health: 200 when cache and history answer, 503 otherwise.
pub(super) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = health::probe(state.cache.as_ref(), state.store.as_ref()).await;
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

/// GET /api/containers/current: latest snapshot, or `{"status": "no_data"}`.
pub(super) async fn current_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    match cache::read_snapshot_set(state.cache.as_ref()).await {
        Ok(Some(set)) => {
            let current: Vec<CurrentContainer> =
                set.containers.iter().map(CurrentContainer::from).collect();
            Ok(Json(current).into_response())
        }
        Ok(None) | Err(PipelineError::DataFormat { .. }) => {
            Ok(Json(serde_json::json!({ "status": "no_data" })).into_response())
        }
        Err(e) => Err(unavailable("get_current", e)),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    hours: Option<u32>,
}

/// GET /api/containers/history?hours=N: records from the last N hours, oldest first.
pub(super) async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = query.hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    let since = state.clock.now_ms() - i64::from(hours) * MS_PER_HOUR;
    let records = state
        .store
        .records_since(since)
        .await
        .map_err(|e| unavailable("get_history", e))?;
    Ok(Json(records))
}

/// POST /api/containers/history: out-of-band bulk ingest, committed as one batch.
pub(super) async fn ingest_handler(
    State(state): State<AppState>,
    Json(entries): Json<Vec<IngestEntry>>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(i) = entries.iter().position(|e| e.name.trim().is_empty()) {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            format!("entry {} has an empty name", i),
        ));
    }
    let now = state.clock.now_ms();
    // Repeats of a name in one request are spaced 1 ms apart, in request order.
    let mut repeats: HashMap<String, i64> = HashMap::new();
    let records: Vec<NewRecord> = entries
        .into_iter()
        .map(|e| {
            let seen = repeats.entry(e.name.clone()).or_insert(0);
            let ts = now + *seen;
            *seen += 1;
            e.into_record(ts)
        })
        .collect();
    let inserted = state
        .store
        .append_batch(&records)
        .await
        .map_err(|e| unavailable("ingest_history", e))?;
    tracing::debug!(operation = "ingest_history", inserted, "bulk ingest");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "inserted": inserted })),
    ))
}
