//! Provider callback endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::debug;

use cadence_engine::IngestOutcome;

use crate::error::ServerError;

use super::AppState;

/// Header carrying the hex HMAC digest of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-cadence-signature";

/// Response body for an accepted webhook.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// How the event was handled.
    pub outcome: String,
}

fn outcome_label(outcome: &IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Applied(_) => "applied",
        IngestOutcome::OutOfOrder => "out_of_order",
        IngestOutcome::Duplicate => "duplicate",
        IngestOutcome::InvalidSignature => "invalid_signature",
        IngestOutcome::Unresolved => "unresolved",
    }
}

/// `POST /v1/webhooks/{provider}` -- ingest an engagement callback.
///
/// The body is passed to verification as raw bytes; parsing happens after
/// the signature check. Duplicates, out-of-order events, and unresolvable
/// events all answer 200 so the provider stops redelivering; only a
/// malformed body (400) or a rejected signature (401) is an error.
pub async fn ingest(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    debug!(provider = %provider, bytes = body.len(), "webhook received");
    let outcome = state.reconciler.ingest(&provider, &body, signature).await?;

    let body = WebhookResponse {
        outcome: outcome_label(&outcome).to_owned(),
    };
    Ok((StatusCode::OK, Json(body)))
}

/// `GET /v1/events/unresolved` -- list callbacks parked for manual
/// reconciliation.
pub async fn unresolved(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let events = state.store.list_unresolved_events().await?;
    Ok((StatusCode::OK, Json(events)))
}
