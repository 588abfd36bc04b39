use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EnrollmentId, WorkflowId};

/// The campaign funnel a workflow instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelKind {
    /// Reminder sequence leading up to the event start.
    PreEvent,
    /// Follow-up sequence after attendance is known.
    PostEvent,
}

impl FunnelKind {
    /// Return a string representation of the funnel kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreEvent => "pre_event",
            Self::PostEvent => "post_event",
        }
    }
}

impl std::fmt::Display for FunnelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a workflow instance. Terminal once it leaves
/// [`Active`](WorkflowStatus::Active).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl WorkflowStatus {
    /// Return `true` once the status can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// One durable state-machine instance driving a funnel for one enrollment.
///
/// Mutated only by the orchestrator advancing `current_step_index` or moving
/// `status` out of `Active`; a non-active instance never produces new
/// dispatch records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique workflow identifier.
    pub id: WorkflowId,

    /// The enrollment this instance belongs to.
    pub enrollment_id: EnrollmentId,

    /// Which funnel the instance runs.
    pub funnel_kind: FunnelKind,

    /// Index of the next step to execute in the funnel's step sequence.
    pub current_step_index: usize,

    /// Lifecycle status.
    pub status: WorkflowStatus,

    /// Reference timestamp step offsets are computed from: the event start
    /// for pre-event funnels, the attendance time (or event end for
    /// no-shows) for post-event funnels.
    pub anchor_time: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Create a new active instance at step 0 with a generated UUID-v4 id.
    #[must_use]
    pub fn new(
        enrollment_id: EnrollmentId,
        funnel_kind: FunnelKind,
        anchor_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WorkflowId::new(Uuid::new_v4().to_string()),
            enrollment_id,
            funnel_kind,
            current_step_index: 0,
            status: WorkflowStatus::Active,
            anchor_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_starts_active_at_step_zero() {
        let instance = WorkflowInstance::new(
            EnrollmentId::new("enr-1"),
            FunnelKind::PreEvent,
            Utc::now(),
        );
        assert_eq!(instance.current_step_index, 0);
        assert_eq!(instance.status, WorkflowStatus::Active);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!WorkflowStatus::Active.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
    }

    #[test]
    fn funnel_kind_serde() {
        assert_eq!(
            serde_json::to_string(&FunnelKind::PreEvent).unwrap(),
            "\"pre_event\""
        );
        let back: FunnelKind = serde_json::from_str("\"post_event\"").unwrap();
        assert_eq!(back, FunnelKind::PostEvent);
    }
}
