use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Channel, ProviderMessageId, StepId, WorkflowId};

/// Delivery/engagement status of a dispatch record.
///
/// Statuses form a forward-only lattice:
/// `Pending → Sent → Delivered → Opened → Clicked`, with `Bounced` and
/// `Complained` absorbing from any non-terminal status, and `Failed`/
/// `Skipped` terminal outcomes of the pending phase. A record never moves
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Failed,
    Skipped,
}

impl DispatchStatus {
    /// Position in the delivery lattice, for forward-only comparisons.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Sent => Some(1),
            Self::Delivered => Some(2),
            Self::Opened => Some(3),
            Self::Clicked => Some(4),
            Self::Bounced | Self::Complained | Self::Failed | Self::Skipped => None,
        }
    }

    /// Return `true` once no further transition out of this status is
    /// permitted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Bounced | Self::Complained | Self::Failed | Self::Skipped
        )
    }

    /// Return `true` if a send has effectively happened or been resolved:
    /// every status except `Pending` and `Failed`. Used by the dispatcher's
    /// idempotent short-circuit.
    #[must_use]
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether a transition `self -> to` moves forward in the lattice.
    ///
    /// Forward jumps are allowed (an `opened` callback arriving before
    /// `delivered` still applies); backward or duplicate transitions are
    /// not. `Failed` and `Skipped` are reachable only from `Pending`;
    /// `Bounced`/`Complained` absorb from any non-terminal status.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        match to {
            Self::Pending => false,
            Self::Failed | Self::Skipped => self == Self::Pending,
            Self::Bounced | Self::Complained => !self.is_terminal(),
            Self::Sent | Self::Delivered | Self::Opened | Self::Clicked => {
                match (self.rank(), to.rank()) {
                    (Some(from), Some(target)) => from < target,
                    _ => false,
                }
            }
        }
    }
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Opened => "opened",
            Self::Clicked => "clicked",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One logical send of a funnel step, and its delivery lifecycle.
///
/// The unique key `(workflow_id, step_id)` is the idempotency anchor: at
/// most one non-failed terminal record exists per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Unique record identifier.
    pub id: String,

    /// The workflow instance the step belongs to.
    pub workflow_id: WorkflowId,

    /// The step being dispatched.
    pub step_id: StepId,

    /// Channel the message goes out on.
    pub channel: Channel,

    /// Current position in the status lattice.
    pub status: DispatchStatus,

    /// Identifier returned by the provider at send time. Used to resolve
    /// inbound webhook events back to this record.
    pub provider_message_id: Option<ProviderMessageId>,

    /// Number of send attempts made so far.
    pub attempt_count: u32,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the status last changed.
    pub last_transition_at: DateTime<Utc>,
}

impl DispatchRecord {
    /// Create a fresh `Pending` record with a generated UUID-v4 id.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, step_id: StepId, channel: Channel) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id,
            step_id,
            channel,
            status: DispatchStatus::Pending,
            provider_message_id: None,
            attempt_count: 0,
            created_at: now,
            last_transition_at: now,
        }
    }
}
