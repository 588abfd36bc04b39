use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use cadence_core::{
    Attendance, Channel, ContactId, DispatchRecord, DispatchStatus, Enrollment, EnrollmentId,
    ProviderEvent, ProviderId, ProviderMessageId, StepId, WorkflowId, WorkflowInstance,
    WorkflowStatus,
};
use cadence_state::audit::AuditEntry;
use cadence_state::contact::ContactProfile;
use cadence_state::error::StateError;
use cadence_state::store::{
    CampaignStore, EventInsert, TransitionResult, UnresolvedEvent,
};

/// In-memory [`CampaignStore`] backed by [`DashMap`]s.
///
/// Every conditional update runs while holding the map's per-key shard
/// guard, so read-check-write on a single record is atomic. This is the
/// "transition under lock" discipline the dispatcher and reconciler rely on;
/// durable backends would express the same conditions as conditional SQL
/// updates.
#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    enrollments: DashMap<String, Enrollment>,
    /// `(contact_id, event_id)` uniqueness index.
    enrollment_index: DashMap<String, EnrollmentId>,
    workflows: DashMap<String, WorkflowInstance>,
    /// `(enrollment_id, funnel_kind)` uniqueness index.
    workflow_index: DashMap<String, WorkflowId>,
    /// Keyed by `(workflow_id, step_id)` — the idempotency anchor.
    dispatches: DashMap<String, DispatchRecord>,
    /// `provider_message_id` → dispatch key, for webhook resolution.
    message_index: DashMap<String, String>,
    /// Keyed by `(provider, external_event_id)`.
    events: DashMap<String, ProviderEvent>,
    unresolved: DashMap<String, UnresolvedEvent>,
    contacts: DashMap<String, ContactProfile>,
    attendance: DashMap<String, Attendance>,
    audit: DashMap<String, Vec<AuditEntry>>,
}

impl MemoryCampaignStore {
    /// Create a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn enrollment_key(contact: &ContactId, event: &cadence_core::EventId) -> String {
        format!("{contact}:{event}")
    }

    fn workflow_key(enrollment: &EnrollmentId, kind: cadence_core::FunnelKind) -> String {
        format!("{enrollment}:{kind}")
    }

    fn dispatch_key(workflow: &WorkflowId, step: &StepId) -> String {
        format!("{workflow}:{step}")
    }

    fn event_key(provider: &ProviderId, external_event_id: &str) -> String {
        format!("{provider}:{external_event_id}")
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn create_enrollment(&self, enrollment: Enrollment) -> Result<(), StateError> {
        let index_key = Self::enrollment_key(&enrollment.contact_id, &enrollment.event_id);

        // Claim the (contact, event) slot first; the entry API makes the
        // claim atomic.
        match self.enrollment_index.entry(index_key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StateError::AlreadyExists(format!(
                "contact {} already enrolled for event {}",
                enrollment.contact_id, enrollment.event_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(enrollment.id.clone());
                self.enrollments
                    .insert(enrollment.id.to_string(), enrollment);
                Ok(())
            }
        }
    }

    async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, StateError> {
        Ok(self.enrollments.get(id.as_str()).map(|e| e.clone()))
    }

    async fn cancel_enrollment(&self, id: &EnrollmentId) -> Result<bool, StateError> {
        let Some(mut enrollment) = self.enrollments.get_mut(id.as_str()) else {
            return Ok(false);
        };
        if enrollment.cancelled {
            return Ok(false);
        }
        enrollment.cancelled = true;
        Ok(true)
    }

    async fn create_workflow(&self, workflow: WorkflowInstance) -> Result<(), StateError> {
        let index_key = Self::workflow_key(&workflow.enrollment_id, workflow.funnel_kind);

        match self.workflow_index.entry(index_key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StateError::AlreadyExists(format!(
                "{} workflow already exists for enrollment {}",
                workflow.funnel_kind, workflow.enrollment_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(workflow.id.clone());
                self.workflows.insert(workflow.id.to_string(), workflow);
                Ok(())
            }
        }
    }

    async fn get_workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowInstance>, StateError> {
        Ok(self.workflows.get(id.as_str()).map(|w| w.clone()))
    }

    async fn list_active_workflows(&self) -> Result<Vec<WorkflowInstance>, StateError> {
        Ok(self
            .workflows
            .iter()
            .filter(|entry| entry.status == WorkflowStatus::Active)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn advance_workflow(
        &self,
        id: &WorkflowId,
        expected_index: usize,
    ) -> Result<bool, StateError> {
        let Some(mut workflow) = self.workflows.get_mut(id.as_str()) else {
            return Err(StateError::NotFound(format!("workflow {id}")));
        };
        if workflow.current_step_index != expected_index {
            return Ok(false);
        }
        workflow.current_step_index += 1;
        Ok(true)
    }

    async fn set_workflow_status(
        &self,
        id: &WorkflowId,
        from: WorkflowStatus,
        to: WorkflowStatus,
    ) -> Result<bool, StateError> {
        let Some(mut workflow) = self.workflows.get_mut(id.as_str()) else {
            return Err(StateError::NotFound(format!("workflow {id}")));
        };
        if workflow.status != from {
            return Ok(false);
        }
        workflow.status = to;
        Ok(true)
    }

    async fn find_or_create_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        channel: Channel,
    ) -> Result<DispatchRecord, StateError> {
        let key = Self::dispatch_key(workflow_id, step_id);

        let record = self
            .dispatches
            .entry(key)
            .or_insert_with(|| {
                DispatchRecord::new(workflow_id.clone(), step_id.clone(), channel)
            })
            .clone();
        Ok(record)
    }

    async fn get_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
    ) -> Result<Option<DispatchRecord>, StateError> {
        let key = Self::dispatch_key(workflow_id, step_id);
        Ok(self.dispatches.get(&key).map(|r| r.clone()))
    }

    async fn transition_dispatch(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        to: DispatchStatus,
        provider_message_id: Option<ProviderMessageId>,
    ) -> Result<TransitionResult, StateError> {
        let key = Self::dispatch_key(workflow_id, step_id);

        let Some(mut record) = self.dispatches.get_mut(&key) else {
            return Err(StateError::NotFound(format!("dispatch {key}")));
        };

        if !record.status.can_transition(to) {
            return Ok(TransitionResult::Stale(record.clone()));
        }

        record.status = to;
        record.last_transition_at = Utc::now();
        if let Some(message_id) = provider_message_id {
            self.message_index
                .insert(message_id.to_string(), key.clone());
            record.provider_message_id = Some(message_id);
        }

        Ok(TransitionResult::Applied(record.clone()))
    }

    async fn increment_dispatch_attempts(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
    ) -> Result<u32, StateError> {
        let key = Self::dispatch_key(workflow_id, step_id);
        let Some(mut record) = self.dispatches.get_mut(&key) else {
            return Err(StateError::NotFound(format!("dispatch {key}")));
        };
        record.attempt_count += 1;
        Ok(record.attempt_count)
    }

    async fn find_dispatch_by_provider_message_id(
        &self,
        id: &ProviderMessageId,
    ) -> Result<Option<DispatchRecord>, StateError> {
        let Some(key) = self.message_index.get(id.as_str()) else {
            return Ok(None);
        };
        Ok(self.dispatches.get(key.value()).map(|r| r.clone()))
    }

    async fn insert_provider_event(
        &self,
        event: ProviderEvent,
    ) -> Result<EventInsert, StateError> {
        let key = Self::event_key(&event.provider, &event.external_event_id);

        match self.events.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                Ok(EventInsert::Duplicate(occupied.get().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(event);
                Ok(EventInsert::Inserted)
            }
        }
    }

    async fn mark_event_processed(
        &self,
        provider: &ProviderId,
        external_event_id: &str,
    ) -> Result<(), StateError> {
        let key = Self::event_key(provider, external_event_id);
        let Some(mut event) = self.events.get_mut(&key) else {
            return Err(StateError::NotFound(format!("provider event {key}")));
        };
        event.processed = true;
        Ok(())
    }

    async fn record_unresolved_event(
        &self,
        unresolved: UnresolvedEvent,
    ) -> Result<(), StateError> {
        let key = Self::event_key(&unresolved.provider, &unresolved.external_event_id);
        self.unresolved.insert(key, unresolved);
        Ok(())
    }

    async fn list_unresolved_events(&self) -> Result<Vec<UnresolvedEvent>, StateError> {
        let mut events: Vec<UnresolvedEvent> =
            self.unresolved.iter().map(|e| e.clone()).collect();
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Option<ContactProfile>, StateError> {
        Ok(self.contacts.get(id.as_str()).map(|c| c.clone()))
    }

    async fn upsert_contact(&self, profile: ContactProfile) -> Result<(), StateError> {
        self.contacts
            .insert(profile.contact_id.to_string(), profile);
        Ok(())
    }

    async fn record_attendance(&self, attendance: Attendance) -> Result<(), StateError> {
        self.attendance
            .insert(attendance.enrollment_id.to_string(), attendance);
        Ok(())
    }

    async fn get_attendance(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<Attendance>, StateError> {
        Ok(self
            .attendance
            .get(enrollment_id.as_str())
            .map(|a| a.clone()))
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StateError> {
        self.audit
            .entry(entry.workflow_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn audit_for_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<AuditEntry>, StateError> {
        Ok(self
            .audit
            .get(workflow_id.as_str())
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }
}
