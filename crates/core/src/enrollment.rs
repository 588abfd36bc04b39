use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consent::ConsentSnapshot;
use crate::types::{ContactId, EnrollmentId, EventId};

/// A contact enrolled against a scheduled event.
///
/// Created once per contact/event pair and immutable afterwards except for
/// the terminal `cancelled` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// Unique enrollment identifier.
    pub id: EnrollmentId,

    /// The enrolled contact.
    pub contact_id: ContactId,

    /// The event the contact is enrolled for.
    pub event_id: EventId,

    /// Scheduled start of the event. Anchor time for pre-event funnels.
    pub event_time: DateTime<Utc>,

    /// Scheduled end of the event. Anchor time for no-show post-event
    /// funnels.
    pub event_end_time: DateTime<Utc>,

    /// When the enrollment was created.
    pub enrolled_at: DateTime<Utc>,

    /// Consent flags captured at enrollment time. Informational only: the
    /// dispatcher re-reads the contact's current consent at send time.
    pub consent: ConsentSnapshot,

    /// Terminal cancellation flag.
    #[serde(default)]
    pub cancelled: bool,
}

impl Enrollment {
    /// Create a new enrollment with a generated UUID-v4 id and `enrolled_at`
    /// set to now.
    #[must_use]
    pub fn new(
        contact_id: impl Into<ContactId>,
        event_id: impl Into<EventId>,
        event_time: DateTime<Utc>,
        event_end_time: DateTime<Utc>,
        consent: ConsentSnapshot,
    ) -> Self {
        Self {
            id: EnrollmentId::new(Uuid::new_v4().to_string()),
            contact_id: contact_id.into(),
            event_id: event_id.into(),
            event_time,
            event_end_time,
            enrolled_at: Utc::now(),
            consent,
            cancelled: false,
        }
    }
}

/// Attendance outcome reported for an enrollment after the event ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    /// The enrollment the outcome belongs to.
    pub enrollment_id: EnrollmentId,
    /// Whether the contact showed up.
    pub attended: bool,
    /// When the contact joined, if they attended.
    pub attended_at: Option<DateTime<Utc>>,
}
