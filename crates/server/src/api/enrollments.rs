//! Enrollment API endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_core::{Channel, ConsentSnapshot, Enrollment, EnrollmentId};
use cadence_state::ContactProfile;

use crate::error::ServerError;

use super::AppState;

/// Request body for enrolling a contact against an event.
#[derive(Debug, Deserialize)]
pub struct EnrollmentRequest {
    /// The contact to enroll.
    pub contact_id: String,
    /// The event to enroll for.
    pub event_id: String,
    /// Scheduled event start.
    pub event_time: DateTime<Utc>,
    /// Scheduled event end.
    pub event_end_time: DateTime<Utc>,
    /// Per-channel consent flags captured with the registration.
    #[serde(default)]
    pub consent: ConsentSnapshot,
    /// Email address, if the contact is reachable by email.
    pub email: Option<String>,
    /// Phone number, if the contact is reachable by SMS.
    pub phone: Option<String>,
}

/// Response after creating an enrollment.
#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    /// The new enrollment id.
    pub enrollment_id: String,
    /// The pre-event workflow started for it.
    pub workflow_id: String,
}

/// `POST /v1/enrollments` -- enroll a contact and start the pre-event
/// funnel. Returns 409 if the contact is already enrolled for the event.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let mut profile = ContactProfile::new(request.contact_id.clone())
        .with_consent(request.consent.clone());
    if let Some(email) = &request.email {
        profile = profile.with_address(Channel::Email, email.clone());
    }
    if let Some(phone) = &request.phone {
        profile = profile.with_address(Channel::Sms, phone.clone());
    }
    state.store.upsert_contact(profile).await?;

    let enrollment = Enrollment::new(
        request.contact_id,
        request.event_id,
        request.event_time,
        request.event_end_time,
        request.consent,
    );
    let enrollment_id = enrollment.id.clone();
    let workflow = state.orchestrator.enroll(enrollment).await?;

    let body = EnrollmentResponse {
        enrollment_id: enrollment_id.to_string(),
        workflow_id: workflow.id.to_string(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// `DELETE /v1/enrollments/{id}` -- cancel an enrollment and stop its
/// pending steps. Already-dispatched messages are unaffected.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let cancelled = state
        .orchestrator
        .cancel_enrollment(&EnrollmentId::new(id))
        .await?;
    if cancelled {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
