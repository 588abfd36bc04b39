//! Health and metrics endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use super::AppState;

/// Snapshot of engine counters.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub dispatched: u64,
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
    pub retries: u64,
    pub webhooks_applied: u64,
    pub webhooks_duplicate: u64,
    pub webhooks_out_of_order: u64,
    pub webhooks_invalid_signature: u64,
    pub webhooks_unresolved: u64,
}

/// Service status plus a metrics snapshot.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub metrics: MetricsResponse,
}

fn snapshot(state: &AppState) -> MetricsResponse {
    let m = &state.metrics;
    MetricsResponse {
        dispatched: m.dispatched(),
        sent: m.sent(),
        skipped: m.skipped(),
        failed: m.failed(),
        retries: m.retries(),
        webhooks_applied: m.webhooks_applied(),
        webhooks_duplicate: m.webhooks_duplicate(),
        webhooks_out_of_order: m.webhooks_out_of_order(),
        webhooks_invalid_signature: m.webhooks_invalid_signature(),
        webhooks_unresolved: m.webhooks_unresolved(),
    }
}

/// `GET /health` -- service status together with a metrics snapshot.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".into(),
        metrics: snapshot(&state),
    };
    (StatusCode::OK, Json(body))
}

/// `GET /metrics` -- engine counters as JSON.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(snapshot(&state)))
}
