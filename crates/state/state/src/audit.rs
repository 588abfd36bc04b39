use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_core::{Channel, StepId, WorkflowId};

/// A single audit entry capturing the outcome of one dispatch attempt or
/// transition, for operational tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this entry (UUID v4).
    pub id: String,
    /// The workflow the entry belongs to; manual sends use the synthetic
    /// workflow id of the manual dispatch.
    pub workflow_id: WorkflowId,
    /// The step that was executed.
    pub step_id: StepId,
    /// Channel the step targeted.
    pub channel: Channel,
    /// Short outcome label (e.g. `sent`, `skipped_consent`, `retry`,
    /// `failed`).
    pub outcome: String,
    /// Free-form details about the outcome.
    pub detail: serde_json::Value,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry recorded now.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        step_id: StepId,
        channel: Channel,
        outcome: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id,
            step_id,
            channel,
            outcome: outcome.into(),
            detail,
            recorded_at: Utc::now(),
        }
    }
}
