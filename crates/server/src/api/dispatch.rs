//! Manual dispatch and workflow inspection endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use cadence_core::{Channel, ContactId, WorkflowId};

use crate::error::ServerError;

use super::AppState;

/// Request body for a one-off send outside any funnel.
#[derive(Debug, Deserialize)]
pub struct ManualDispatchRequest {
    /// The contact to message.
    pub contact_id: String,
    /// Delivery channel.
    pub channel: Channel,
    /// Template the provider renders.
    pub template_id: String,
    /// Template variables.
    #[serde(default)]
    pub variables: serde_json::Value,
}

/// Response after a manual dispatch.
#[derive(Debug, Serialize)]
pub struct ManualDispatchResponse {
    /// Synthetic workflow id the send was ledgered under.
    pub workflow_id: String,
    /// Resulting dispatch status.
    pub status: String,
    /// Provider message id, when the send was accepted.
    pub provider_message_id: Option<String>,
}

/// `POST /v1/dispatch` -- send a one-off message. Consent still applies;
/// a denied channel answers with a `skipped` status, not an error.
pub async fn manual(
    State(state): State<AppState>,
    Json(request): Json<ManualDispatchRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let contact_id = ContactId::new(request.contact_id);
    let Some(contact) = state.store.get_contact(&contact_id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown contact" })),
        )
            .into_response());
    };

    let record = state
        .dispatcher
        .dispatch_manual(&contact, request.channel, &request.template_id, request.variables)
        .await?;

    let body = ManualDispatchResponse {
        workflow_id: record.workflow_id.to_string(),
        status: record.status.to_string(),
        provider_message_id: record.provider_message_id.map(|id| id.to_string()),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `GET /v1/workflows/{id}` -- fetch a workflow instance.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let id = WorkflowId::new(id);
    match state.store.get_workflow(&id).await? {
        Some(workflow) => Ok((StatusCode::OK, Json(workflow)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown workflow" })),
        )
            .into_response()),
    }
}

/// `GET /v1/workflows/{id}/audit` -- list the workflow's audit trail,
/// oldest first.
pub async fn get_audit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let entries = state.store.audit_for_workflow(&WorkflowId::new(id)).await?;
    Ok((StatusCode::OK, Json(entries)))
}
