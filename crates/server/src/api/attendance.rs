//! Attendance API endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_core::{Attendance, EnrollmentId};

use crate::error::ServerError;

use super::AppState;

/// Request body for reporting an attendance outcome.
#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    /// The enrollment the outcome belongs to.
    pub enrollment_id: String,
    /// Whether the contact showed up.
    pub attended: bool,
    /// When the contact joined, if known.
    pub attended_at: Option<DateTime<Utc>>,
}

/// Response after recording attendance.
#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    /// The post-event workflow started for the enrollment.
    pub workflow_id: String,
    /// The timestamp follow-up offsets are computed from.
    pub anchor_time: DateTime<Utc>,
}

/// `POST /v1/attendance` -- record the outcome and start the post-event
/// funnel. Returns 409 if the outcome was already reported.
pub async fn record(
    State(state): State<AppState>,
    Json(request): Json<AttendanceRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let workflow = state
        .orchestrator
        .record_attendance(Attendance {
            enrollment_id: EnrollmentId::new(request.enrollment_id),
            attended: request.attended,
            attended_at: request.attended_at,
        })
        .await?;

    let body = AttendanceResponse {
        workflow_id: workflow.id.to_string(),
        anchor_time: workflow.anchor_time,
    };
    Ok((StatusCode::CREATED, Json(body)))
}
