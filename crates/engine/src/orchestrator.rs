//! Funnel orchestration.
//!
//! The orchestrator owns the workflow lifecycle: it creates instances at
//! enrollment and attendance time, schedules step pokes, and executes due
//! steps by walking each instance through its funnel's step sequence. All
//! progress lives in the campaign store; the scheduler holds only
//! redundant pokes, so [`FunnelOrchestrator::recover`] can rebuild the
//! queue from the store after a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use cadence_core::{
    Attendance, DispatchStatus, Enrollment, EnrollmentId, FunnelKind, StepDefinition,
    StepPrecondition, WorkflowInstance, WorkflowStatus,
};
use cadence_state::{AuditEntry, CampaignStore, TransitionResult};

use crate::config::EngineConfig;
use crate::dispatcher::{DispatchOutcome, MessageDispatcher};
use crate::error::EngineError;
use crate::scheduler::{ScheduledTask, Scheduler};

/// The static step sequences for every funnel kind.
#[derive(Debug, Clone, Default)]
pub struct StepTable {
    funnels: HashMap<FunnelKind, Vec<StepDefinition>>,
}

impl StepTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step sequence for a funnel kind. Order is significant.
    #[must_use]
    pub fn with_funnel(mut self, kind: FunnelKind, steps: Vec<StepDefinition>) -> Self {
        self.funnels.insert(kind, steps);
        self
    }

    /// The step sequence for a funnel kind, if one is defined.
    #[must_use]
    pub fn steps(&self, kind: FunnelKind) -> Option<&[StepDefinition]> {
        self.funnels.get(&kind).map(Vec::as_slice)
    }
}

/// Drives funnel workflows from enrollment to completion.
pub struct FunnelOrchestrator {
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<MessageDispatcher>,
    scheduler: Arc<dyn Scheduler>,
    steps: StepTable,
    config: EngineConfig,
}

impl FunnelOrchestrator {
    /// Create an orchestrator over the given components.
    pub fn new(
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<MessageDispatcher>,
        scheduler: Arc<dyn Scheduler>,
        steps: StepTable,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            scheduler,
            steps,
            config,
        }
    }

    /// Enroll a contact for an event and start its pre-event funnel.
    ///
    /// The pre-event workflow is anchored at the event start time, so
    /// negative step offsets fire before the event. Fails with
    /// [`cadence_state::StateError::AlreadyExists`] if the contact is
    /// already enrolled for the event.
    #[instrument(skip(self, enrollment), fields(
        enrollment_id = %enrollment.id,
        contact_id = %enrollment.contact_id,
        event_id = %enrollment.event_id,
    ))]
    pub async fn enroll(&self, enrollment: Enrollment) -> Result<WorkflowInstance, EngineError> {
        let steps = self
            .steps
            .steps(FunnelKind::PreEvent)
            .ok_or(EngineError::NoSteps(FunnelKind::PreEvent))?;

        self.store.create_enrollment(enrollment.clone()).await?;

        let workflow = WorkflowInstance::new(
            enrollment.id.clone(),
            FunnelKind::PreEvent,
            enrollment.event_time,
        );
        self.store.create_workflow(workflow.clone()).await?;

        let due_at = steps[0].fire_time(workflow.anchor_time);
        self.scheduler
            .schedule(ScheduledTask::new(workflow.id.clone(), 0, due_at))
            .await?;

        info!(workflow_id = %workflow.id, %due_at, "pre-event funnel started");
        Ok(workflow)
    }

    /// Record an attendance outcome and start the post-event funnel.
    ///
    /// The post-event workflow is anchored at the join time for attendees
    /// and at the scheduled event end for no-shows, so follow-up offsets
    /// count from when the contact's event actually concluded.
    #[instrument(skip(self, attendance), fields(
        enrollment_id = %attendance.enrollment_id,
        attended = attendance.attended,
    ))]
    pub async fn record_attendance(
        &self,
        attendance: Attendance,
    ) -> Result<WorkflowInstance, EngineError> {
        let steps = self
            .steps
            .steps(FunnelKind::PostEvent)
            .ok_or(EngineError::NoSteps(FunnelKind::PostEvent))?;

        let enrollment = self
            .store
            .get_enrollment(&attendance.enrollment_id)
            .await?
            .ok_or_else(|| EngineError::EnrollmentNotFound(attendance.enrollment_id.clone()))?;

        let anchor = if attendance.attended {
            attendance.attended_at.unwrap_or(enrollment.event_end_time)
        } else {
            enrollment.event_end_time
        };

        self.store.record_attendance(attendance).await?;

        let workflow =
            WorkflowInstance::new(enrollment.id.clone(), FunnelKind::PostEvent, anchor);
        self.store.create_workflow(workflow.clone()).await?;

        let due_at = steps[0].fire_time(workflow.anchor_time);
        self.scheduler
            .schedule(ScheduledTask::new(workflow.id.clone(), 0, due_at))
            .await?;

        info!(workflow_id = %workflow.id, %due_at, "post-event funnel started");
        Ok(workflow)
    }

    /// Cancel an enrollment and every active workflow attached to it.
    ///
    /// Steps already dispatched are unaffected; pending steps will never
    /// fire. Returns `false` if the enrollment was unknown or already
    /// cancelled.
    #[instrument(skip(self))]
    pub async fn cancel_enrollment(&self, id: &EnrollmentId) -> Result<bool, EngineError> {
        if !self.store.cancel_enrollment(id).await? {
            return Ok(false);
        }

        for workflow in self.store.list_active_workflows().await? {
            if workflow.enrollment_id == *id {
                self.store
                    .set_workflow_status(&workflow.id, WorkflowStatus::Active, WorkflowStatus::Cancelled)
                    .await?;
                info!(workflow_id = %workflow.id, "workflow cancelled");
            }
        }
        Ok(true)
    }

    /// Drain the scheduler and execute every due step.
    ///
    /// A failure executing one task never stops the others: the failed
    /// task is re-scheduled after a short delay and the sweep continues.
    /// Returns the number of tasks handled.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let tasks = self.scheduler.due(now).await?;
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = self.execute_workflow_step(&task, now).await {
                warn!(
                    workflow_id = %task.workflow_id,
                    step_index = task.step_index,
                    error = %e,
                    "step execution failed, re-scheduling"
                );
                let retry_at = now + to_delta(self.config.reschedule_delay);
                self.scheduler
                    .schedule(ScheduledTask::new(
                        task.workflow_id.clone(),
                        task.step_index,
                        retry_at,
                    ))
                    .await?;
            }
        }
        Ok(count)
    }

    /// Rebuild the scheduler from persisted state after a restart.
    ///
    /// Every active workflow gets an immediate poke; execution re-derives
    /// each step's real fire time and re-queues anything not yet due, so
    /// no in-memory timer state is needed to survive the restart.
    #[instrument(skip(self))]
    pub async fn recover(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let active = self.store.list_active_workflows().await?;
        let count = active.len();
        for workflow in active {
            self.scheduler
                .schedule(ScheduledTask::new(
                    workflow.id.clone(),
                    workflow.current_step_index,
                    now,
                ))
                .await?;
        }
        info!(workflows = count, "recovery re-seeded scheduler");
        Ok(count)
    }

    /// Execute one scheduled poke for a workflow step.
    ///
    /// Tolerates stale tasks: if the workflow has advanced, terminated, or
    /// the step is not yet due, the task is dropped or re-queued without
    /// side effects. Exactly-once sending is guaranteed by the dispatch
    /// ledger, not by the scheduler.
    #[instrument(skip(self, task), fields(
        workflow_id = %task.workflow_id,
        step_index = task.step_index,
    ))]
    async fn execute_workflow_step(
        &self,
        task: &ScheduledTask,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let Some(workflow) = self.store.get_workflow(&task.workflow_id).await? else {
            // Dropping (rather than erroring) avoids re-queueing a task that
            // can never succeed.
            warn!("task references unknown workflow, dropping");
            return Ok(());
        };

        if workflow.status.is_terminal() {
            debug!(status = ?workflow.status, "workflow terminal, dropping task");
            return Ok(());
        }
        if task.step_index != workflow.current_step_index {
            debug!(
                current = workflow.current_step_index,
                "stale task for already-handled step"
            );
            return Ok(());
        }

        let steps = self
            .steps
            .steps(workflow.funnel_kind)
            .ok_or(EngineError::NoSteps(workflow.funnel_kind))?;

        if workflow.current_step_index >= steps.len() {
            self.complete(&workflow).await?;
            return Ok(());
        }
        let step = &steps[workflow.current_step_index];

        let fire_at = step.fire_time(workflow.anchor_time);
        if fire_at > now {
            debug!(%fire_at, "step not yet due, re-queueing");
            self.scheduler
                .schedule(ScheduledTask::new(
                    workflow.id.clone(),
                    workflow.current_step_index,
                    fire_at,
                ))
                .await?;
            return Ok(());
        }

        let enrollment = self
            .store
            .get_enrollment(&workflow.enrollment_id)
            .await?
            .ok_or_else(|| EngineError::EnrollmentNotFound(workflow.enrollment_id.clone()))?;

        if enrollment.cancelled {
            self.store
                .set_workflow_status(&workflow.id, WorkflowStatus::Active, WorkflowStatus::Cancelled)
                .await?;
            info!("enrollment cancelled, workflow stopped");
            return Ok(());
        }

        if !self.precondition_holds(&workflow, &enrollment, step).await? {
            self.skip_step(&workflow, step, "skipped_precondition").await?;
            self.advance(&workflow, steps, now).await?;
            return Ok(());
        }

        let Some(contact) = self.store.get_contact(&enrollment.contact_id).await? else {
            // No profile means no consent on file; fail closed.
            self.skip_step(&workflow, step, "skipped_no_contact").await?;
            self.advance(&workflow, steps, now).await?;
            return Ok(());
        };

        match self
            .dispatcher
            .dispatch_step(&workflow.id, step, &contact)
            .await?
        {
            DispatchOutcome::Completed(_) => {
                self.advance(&workflow, steps, now).await?;
            }
            DispatchOutcome::RetryAfter { delay, .. } => {
                let retry_at = now + to_delta(delay);
                self.scheduler
                    .schedule(ScheduledTask::new(
                        workflow.id.clone(),
                        workflow.current_step_index,
                        retry_at,
                    ))
                    .await?;
            }
        }
        Ok(())
    }

    /// Evaluate a step's precondition against current state, not an
    /// enrollment-time snapshot.
    async fn precondition_holds(
        &self,
        workflow: &WorkflowInstance,
        enrollment: &Enrollment,
        step: &StepDefinition,
    ) -> Result<bool, EngineError> {
        match step.precondition {
            StepPrecondition::Always => Ok(true),
            StepPrecondition::NotAttended => {
                let attendance = self.store.get_attendance(&enrollment.id).await?;
                Ok(!attendance.is_some_and(|a| a.attended))
            }
            StepPrecondition::Attended => {
                let attendance = self.store.get_attendance(&enrollment.id).await?;
                Ok(attendance.is_some_and(|a| a.attended))
            }
            StepPrecondition::PreviousStepOpened => {
                let Some(index) = workflow.current_step_index.checked_sub(1) else {
                    // A first step can have no opened predecessor.
                    return Ok(false);
                };
                let steps = self
                    .steps
                    .steps(workflow.funnel_kind)
                    .ok_or(EngineError::NoSteps(workflow.funnel_kind))?;
                let previous = &steps[index];
                let record = self
                    .store
                    .get_dispatch(&workflow.id, &previous.step_id)
                    .await?;
                Ok(record.is_some_and(|r| {
                    matches!(r.status, DispatchStatus::Opened | DispatchStatus::Clicked)
                }))
            }
        }
    }

    /// Settle a step as skipped in the dispatch ledger with an audit entry.
    async fn skip_step(
        &self,
        workflow: &WorkflowInstance,
        step: &StepDefinition,
        outcome: &str,
    ) -> Result<(), EngineError> {
        self.store
            .find_or_create_dispatch(&workflow.id, &step.step_id, step.channel)
            .await?;
        let result = self
            .store
            .transition_dispatch(&workflow.id, &step.step_id, DispatchStatus::Skipped, None)
            .await?;
        if let TransitionResult::Applied(_) = result {
            info!(step_id = %step.step_id, outcome, "step skipped");
            self.store
                .append_audit(AuditEntry::new(
                    workflow.id.clone(),
                    step.step_id.clone(),
                    step.channel,
                    outcome,
                    json!({ "enrollment_id": workflow.enrollment_id.as_str() }),
                ))
                .await?;
        }
        Ok(())
    }

    /// Move the workflow past its current step, scheduling the next step or
    /// completing the funnel.
    async fn advance(
        &self,
        workflow: &WorkflowInstance,
        steps: &[StepDefinition],
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let index = workflow.current_step_index;
        if !self.store.advance_workflow(&workflow.id, index).await? {
            // Lost the race to a concurrent execution of the same task.
            debug!("concurrent advance already applied");
            return Ok(());
        }

        let next = index + 1;
        if next >= steps.len() {
            self.complete(workflow).await?;
            return Ok(());
        }

        let due_at = steps[next].fire_time(workflow.anchor_time).max(now);
        self.scheduler
            .schedule(ScheduledTask::new(workflow.id.clone(), next, due_at))
            .await?;
        Ok(())
    }

    async fn complete(&self, workflow: &WorkflowInstance) -> Result<(), EngineError> {
        if self
            .store
            .set_workflow_status(&workflow.id, WorkflowStatus::Active, WorkflowStatus::Completed)
            .await?
        {
            info!(funnel = %workflow.funnel_kind, "funnel completed");
        }
        Ok(())
    }
}

/// Convert a scheduler delay to chrono. Delays are bounded by the retry
/// strategy's clamp, so the conversion cannot realistically fail; the
/// fallback keeps the task alive regardless.
fn to_delta(delay: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::hours(1))
}
