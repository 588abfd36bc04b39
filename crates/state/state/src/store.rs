use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_core::{
    Attendance, Channel, DispatchRecord, DispatchStatus, EngagementKind, Enrollment, EnrollmentId,
    ProviderEvent, ProviderId, ProviderMessageId, StepId, WorkflowId, WorkflowInstance,
    WorkflowStatus,
};

use crate::audit::AuditEntry;
use crate::contact::ContactProfile;
use crate::error::StateError;

/// Result of a conditional dispatch-record transition.
#[derive(Debug, Clone)]
pub enum TransitionResult {
    /// The transition was forward in the lattice and has been applied.
    Applied(DispatchRecord),
    /// The transition would have moved the record backward (or out of a
    /// terminal status) and was rejected; the record is returned unchanged.
    Stale(DispatchRecord),
}

/// Result of inserting into the provider-event ledger.
#[derive(Debug, Clone)]
pub enum EventInsert {
    /// The event was not seen before and has been appended.
    Inserted,
    /// An event with the same `(provider, external_event_id)` already
    /// exists; the stored event is returned.
    Duplicate(ProviderEvent),
}

/// A webhook event whose target dispatch record could not be resolved,
/// parked for manual reconciliation. Never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedEvent {
    /// Which provider sent the callback.
    pub provider: ProviderId,
    /// Provider-assigned event identifier.
    pub external_event_id: String,
    /// The engagement signal the event carried.
    pub event_type: EngagementKind,
    /// The provider message id that failed to resolve.
    pub provider_message_id: ProviderMessageId,
    /// Why resolution failed.
    pub reason: String,
    /// When the callback was received.
    pub received_at: DateTime<Utc>,
}

/// Trait for persisting campaign state: enrollments, workflow instances,
/// dispatch records (the idempotency ledger), the provider-event ledger,
/// contact profiles, attendance, and the audit trail.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Every read-check-write method (`advance_workflow`, `set_workflow_status`,
/// `find_or_create_dispatch`, `transition_dispatch`, `insert_provider_event`)
/// must be atomic per key so concurrent retries and concurrent webhook
/// deliveries for the same record cannot produce lost updates.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    // -- Enrollments --------------------------------------------------------

    /// Persist a new enrollment. Fails with [`StateError::AlreadyExists`]
    /// if the contact is already enrolled for the event.
    async fn create_enrollment(&self, enrollment: Enrollment) -> Result<(), StateError>;

    /// Fetch an enrollment by id.
    async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, StateError>;

    /// Set the terminal cancellation flag. Returns `false` if the
    /// enrollment does not exist or was already cancelled.
    async fn cancel_enrollment(&self, id: &EnrollmentId) -> Result<bool, StateError>;

    // -- Workflow instances -------------------------------------------------

    /// Persist a new workflow instance. Fails with
    /// [`StateError::AlreadyExists`] if an instance already exists for the
    /// same enrollment and funnel kind.
    async fn create_workflow(&self, workflow: WorkflowInstance) -> Result<(), StateError>;

    /// Fetch a workflow instance by id.
    async fn get_workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowInstance>, StateError>;

    /// List every instance still in `Active` status. Used on restart to
    /// recompute due steps from persisted state alone.
    async fn list_active_workflows(&self) -> Result<Vec<WorkflowInstance>, StateError>;

    /// Advance `current_step_index` by one, only if it currently equals
    /// `expected_index` (compare-and-swap against concurrent executions).
    /// Returns `true` if the advance was applied.
    async fn advance_workflow(
        &self,
        id: &WorkflowId,
        expected_index: usize,
    ) -> Result<bool, StateError>;

    /// Move an instance's status from `from` to `to`, only if it is
    /// currently `from`. Returns `true` if the change was applied.
    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        from: WorkflowStatus,
        to: WorkflowStatus,
    ) -> Result<bool, StateError>;

    // -- Dispatch records (idempotency ledger) ------------------------------

    /// Return the existing record for `(workflow_id, step_id)`, or create
    /// and return a fresh `Pending` one. Atomic: concurrent callers for the
    /// same key observe the same record.
    async fn find_or_create_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        channel: Channel,
    ) -> Result<DispatchRecord, StateError>;

    /// Fetch the record for `(workflow_id, step_id)` if it exists.
    async fn get_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
    ) -> Result<Option<DispatchRecord>, StateError>;

    /// Conditionally move a record forward in the status lattice. The
    /// transition applies only if permitted from the record's current
    /// status; otherwise the unchanged record comes back as
    /// [`TransitionResult::Stale`]. When `provider_message_id` is given it
    /// is stored and indexed for webhook resolution.
    async fn transition_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        to: DispatchStatus,
        provider_message_id: Option<ProviderMessageId>,
    ) -> Result<TransitionResult, StateError>;

    /// Increment the record's attempt counter, returning the new count.
    async fn increment_dispatch_attempts(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
    ) -> Result<u32, StateError>;

    /// Resolve a dispatch record from the provider message id stored at
    /// send time.
    async fn find_dispatch_by_provider_message_id(
        &self,
        id: &ProviderMessageId,
    ) -> Result<Option<DispatchRecord>, StateError>;

    // -- Provider event ledger ----------------------------------------------

    /// Append a raw callback to the ledger, deduplicated by
    /// `(provider, external_event_id)`.
    async fn insert_provider_event(&self, event: ProviderEvent)
    -> Result<EventInsert, StateError>;

    /// Mark a ledger entry processed. Called only after the matching
    /// dispatch record update has committed.
    async fn mark_event_processed(
        &self,
        provider: &ProviderId,
        external_event_id: &str,
    ) -> Result<(), StateError>;

    /// Park a webhook event whose target could not be resolved.
    async fn record_unresolved_event(&self, unresolved: UnresolvedEvent)
    -> Result<(), StateError>;

    /// List parked events awaiting manual reconciliation.
    async fn list_unresolved_events(&self) -> Result<Vec<UnresolvedEvent>, StateError>;

    // -- Contacts -----------------------------------------------------------

    /// Fetch a contact's current addresses and consent.
    async fn get_contact(&self, id: &cadence_core::ContactId)
    -> Result<Option<ContactProfile>, StateError>;

    /// Create or replace a contact profile.
    async fn upsert_contact(&self, profile: ContactProfile) -> Result<(), StateError>;

    // -- Attendance ---------------------------------------------------------

    /// Record the attendance outcome for an enrollment.
    async fn record_attendance(&self, attendance: Attendance) -> Result<(), StateError>;

    /// Fetch the attendance outcome for an enrollment, if reported.
    async fn get_attendance(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<Attendance>, StateError>;

    // -- Audit trail --------------------------------------------------------

    /// Append an audit entry.
    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StateError>;

    /// List audit entries for a workflow, oldest first.
    async fn audit_for_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<AuditEntry>, StateError>;
}
