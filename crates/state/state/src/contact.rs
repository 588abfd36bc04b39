use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cadence_core::{Channel, ConsentSnapshot, ContactId};

/// A contact's current reachable addresses and consent flags.
///
/// Read at dispatch time, not at enrollment time, so a post-enrollment
/// opt-out takes effect on the next pending step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactProfile {
    /// The contact this profile belongs to.
    pub contact_id: ContactId,

    /// Destination per channel (email address, phone number).
    #[serde(default)]
    pub addresses: HashMap<Channel, String>,

    /// Current per-channel consent.
    #[serde(default)]
    pub consent: ConsentSnapshot,
}

impl ContactProfile {
    /// Create a profile with no addresses and no consent.
    #[must_use]
    pub fn new(contact_id: impl Into<ContactId>) -> Self {
        Self {
            contact_id: contact_id.into(),
            addresses: HashMap::new(),
            consent: ConsentSnapshot::default(),
        }
    }

    /// Set the destination for a channel.
    #[must_use]
    pub fn with_address(mut self, channel: Channel, destination: impl Into<String>) -> Self {
        self.addresses.insert(channel, destination.into());
        self
    }

    /// Set the consent snapshot.
    #[must_use]
    pub fn with_consent(mut self, consent: ConsentSnapshot) -> Self {
        self.consent = consent;
        self
    }

    /// The contact's destination for a channel, if one is on file.
    #[must_use]
    pub fn address(&self, channel: Channel) -> Option<&str> {
        self.addresses.get(&channel).map(String::as_str)
    }
}
