use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchStatus;
use crate::types::ProviderId;

/// Engagement signal carried by a provider callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
}

impl EngagementKind {
    /// The dispatch status this engagement maps onto.
    #[must_use]
    pub fn target_status(self) -> DispatchStatus {
        match self {
            Self::Delivered => DispatchStatus::Delivered,
            Self::Opened => DispatchStatus::Opened,
            Self::Clicked => DispatchStatus::Clicked,
            Self::Bounced => DispatchStatus::Bounced,
            Self::Complained => DispatchStatus::Complained,
        }
    }
}

/// Append-only ledger entry for one raw inbound provider callback.
///
/// Deduplicated by `(provider, external_event_id)`; never updated again once
/// `processed` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Which provider sent the callback.
    pub provider: ProviderId,

    /// Provider-assigned event identifier, unique per provider.
    pub external_event_id: String,

    /// The engagement signal, if the payload parsed to a known kind.
    pub event_type: EngagementKind,

    /// When the callback was received.
    pub received_at: DateTime<Utc>,

    /// Whether the payload's signature verified against the provider's
    /// shared secret.
    pub signature_valid: bool,

    /// Set to true only after the matching dispatch record update commits,
    /// so reprocessing after a crash is safe.
    pub processed: bool,
}

impl ProviderEvent {
    /// Create an unprocessed event received now.
    #[must_use]
    pub fn new(
        provider: impl Into<ProviderId>,
        external_event_id: impl Into<String>,
        event_type: EngagementKind,
        signature_valid: bool,
    ) -> Self {
        Self {
            provider: provider.into(),
            external_event_id: external_event_id.into(),
            event_type,
            received_at: Utc::now(),
            signature_valid,
            processed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_maps_to_status() {
        assert_eq!(
            EngagementKind::Delivered.target_status(),
            DispatchStatus::Delivered
        );
        assert_eq!(
            EngagementKind::Bounced.target_status(),
            DispatchStatus::Bounced
        );
    }

    #[test]
    fn new_event_is_unprocessed() {
        let event = ProviderEvent::new("email", "evt-1", EngagementKind::Opened, true);
        assert!(!event.processed);
        assert!(event.signature_valid);
        assert_eq!(event.external_event_id, "evt-1");
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = ProviderEvent::new("sms", "evt-2", EngagementKind::Clicked, false);
        let json = serde_json::to_string(&event).unwrap();
        let back: ProviderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.external_event_id, event.external_event_id);
        assert_eq!(back.event_type, event.event_type);
        assert!(!back.signature_valid);
    }
}
