use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, StepId};

/// Condition that must hold at fire time for a step to dispatch.
///
/// Evaluated against the contact's current registration and engagement
/// state, not against a snapshot. A failed precondition marks the step
/// `skipped` without calling any provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPrecondition {
    /// Dispatch unconditionally.
    Always,
    /// Dispatch only if the contact has not (yet) attended the event.
    NotAttended,
    /// Dispatch only if the contact attended the event.
    Attended,
    /// Dispatch only if the previous step's message was opened.
    PreviousStepOpened,
}

/// Static definition of one timed step within a funnel.
///
/// Step sequences are fixed per funnel kind and ordered; ordering is
/// significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Stable step identifier, unique within the funnel.
    pub step_id: StepId,

    /// Signed offset from the workflow's anchor time. Negative offsets fire
    /// before the anchor (e.g. a T-24h reminder).
    #[serde(with = "offset_seconds")]
    pub offset: TimeDelta,

    /// Delivery channel for the step's message.
    pub channel: Channel,

    /// Template the provider renders for this step.
    pub template_id: String,

    /// Gate evaluated immediately before dispatch.
    pub precondition: StepPrecondition,
}

impl StepDefinition {
    /// Create a step that always dispatches.
    #[must_use]
    pub fn new(
        step_id: impl Into<StepId>,
        offset: TimeDelta,
        channel: Channel,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            offset,
            channel,
            template_id: template_id.into(),
            precondition: StepPrecondition::Always,
        }
    }

    /// Set the step's precondition.
    #[must_use]
    pub fn with_precondition(mut self, precondition: StepPrecondition) -> Self {
        self.precondition = precondition;
        self
    }

    /// Compute the absolute fire time for this step from an anchor.
    #[must_use]
    pub fn fire_time(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        anchor + self.offset
    }
}

/// Serialize the step offset as whole seconds so definitions round-trip
/// through JSON and TOML without chrono's internal representation leaking.
mod offset_seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(offset: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        offset.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Ok(TimeDelta::seconds(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_time_with_negative_offset() {
        let anchor = Utc::now();
        let step = StepDefinition::new("reminder-24h", TimeDelta::hours(-24), Channel::Email, "t1");
        assert_eq!(step.fire_time(anchor), anchor - TimeDelta::hours(24));
    }

    #[test]
    fn default_precondition_is_always() {
        let step = StepDefinition::new("s", TimeDelta::zero(), Channel::Sms, "t");
        assert_eq!(step.precondition, StepPrecondition::Always);
    }

    #[test]
    fn with_precondition() {
        let step = StepDefinition::new("s", TimeDelta::zero(), Channel::Email, "t")
            .with_precondition(StepPrecondition::NotAttended);
        assert_eq!(step.precondition, StepPrecondition::NotAttended);
    }

    #[test]
    fn offset_serde_as_seconds() {
        let step = StepDefinition::new("s", TimeDelta::hours(-1), Channel::Email, "t");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["offset"], serde_json::json!(-3600));
        let back: StepDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back.offset, TimeDelta::hours(-1));
    }
}
