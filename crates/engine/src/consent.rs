//! The consent gate.
//!
//! A pure predicate with no I/O: the dispatcher reads the contact's current
//! consent snapshot from the store and asks this gate before any provider is
//! touched. A denial is a terminal `skipped` outcome for the step, not an
//! error, and is never retried.

use cadence_core::{Channel, ConsentSnapshot};

/// Return `true` only if the channel-specific consent flag is explicitly
/// granted. Absent or refused consent fails closed.
#[must_use]
pub fn allowed(consent: &ConsentSnapshot, channel: Channel) -> bool {
    consent.granted(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_grant_allows() {
        let consent = ConsentSnapshot {
            email: Some(true),
            sms: None,
        };
        assert!(allowed(&consent, Channel::Email));
    }

    #[test]
    fn absent_consent_denies() {
        let consent = ConsentSnapshot::default();
        assert!(!allowed(&consent, Channel::Email));
        assert!(!allowed(&consent, Channel::Sms));
    }

    #[test]
    fn refusal_denies() {
        let consent = ConsentSnapshot {
            email: Some(false),
            sms: Some(false),
        };
        assert!(!allowed(&consent, Channel::Email));
        assert!(!allowed(&consent, Channel::Sms));
    }
}
