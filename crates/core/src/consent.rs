use serde::{Deserialize, Serialize};

use crate::types::Channel;

/// Per-channel consent flags captured for a contact.
///
/// Each flag is tri-state: `Some(true)` is an explicit grant, `Some(false)`
/// an explicit refusal, and `None` means consent was never recorded. Only an
/// explicit grant permits a send; the other two states fail closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSnapshot {
    /// Consent to receive email.
    #[serde(default)]
    pub email: Option<bool>,
    /// Consent to receive SMS.
    #[serde(default)]
    pub sms: Option<bool>,
}

impl ConsentSnapshot {
    /// A snapshot with every channel explicitly granted.
    #[must_use]
    pub fn all_granted() -> Self {
        Self {
            email: Some(true),
            sms: Some(true),
        }
    }

    /// Return `true` only if the channel has an explicit grant.
    #[must_use]
    pub fn granted(&self, channel: Channel) -> bool {
        let flag = match channel {
            Channel::Email => self.email,
            Channel::Sms => self.sms,
        };
        flag == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_consent_is_not_granted() {
        let snapshot = ConsentSnapshot::default();
        assert!(!snapshot.granted(Channel::Email));
        assert!(!snapshot.granted(Channel::Sms));
    }

    #[test]
    fn explicit_refusal_is_not_granted() {
        let snapshot = ConsentSnapshot {
            email: Some(false),
            sms: Some(true),
        };
        assert!(!snapshot.granted(Channel::Email));
        assert!(snapshot.granted(Channel::Sms));
    }

    #[test]
    fn all_granted_grants_every_channel() {
        let snapshot = ConsentSnapshot::all_granted();
        assert!(snapshot.granted(Channel::Email));
        assert!(snapshot.granted(Channel::Sms));
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let snapshot: ConsentSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.email, None);
        assert_eq!(snapshot.sms, None);
    }
}
