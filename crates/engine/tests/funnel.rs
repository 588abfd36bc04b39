//! End-to-end funnel scenarios: enrollment through dispatch, engagement
//! webhooks, attendance follow-ups, cancellation, and restart recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;

use cadence_core::{
    Attendance, Channel, ConsentSnapshot, DispatchStatus, Enrollment, FunnelKind,
    ProviderMessageId, StepDefinition, StepPrecondition, WorkflowStatus,
};
use cadence_engine::{
    EngineConfig, EngineMetrics, FunnelOrchestrator, IngestOutcome, MemoryScheduler,
    MessageDispatcher, RetryStrategy, Scheduler, StepTable, WebhookReconciler,
};
use cadence_provider::{DynProvider, Provider, ProviderError, ProviderRegistry, SendReceipt,
    SendRequest};
use cadence_state::{CampaignStore, ContactProfile};
use cadence_state_memory::MemoryCampaignStore;

/// Provider that fails its first `fail_times` sends with a transient error,
/// then succeeds with sequential message ids.
struct ScriptedProvider {
    fail_times: u32,
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn reliable() -> Self {
        Self {
            fail_times: 0,
            calls: AtomicU32::new(0),
        }
    }

    fn flaky(fail_times: u32) -> Self {
        Self {
            fail_times,
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, _request: &SendRequest) -> Result<SendReceipt, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            return Err(ProviderError::Connection("simulated outage".into()));
        }
        Ok(SendReceipt {
            provider_message_id: ProviderMessageId::new(format!("msg-{call}")),
        })
    }

    fn verify_signature(&self, _raw_payload: &[u8], _signature_header: &str) -> bool {
        true
    }
}

struct Harness {
    store: Arc<MemoryCampaignStore>,
    scheduler: Arc<MemoryScheduler>,
    orchestrator: FunnelOrchestrator,
    reconciler: WebhookReconciler,
    provider: Arc<ScriptedProvider>,
}

fn harness(provider: ScriptedProvider, steps: StepTable) -> Harness {
    let store = Arc::new(MemoryCampaignStore::new());
    let scheduler = Arc::new(MemoryScheduler::new());
    let provider = Arc::new(provider);
    let metrics = Arc::new(EngineMetrics::new());

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::clone(&provider) as Arc<dyn DynProvider>);
    let registry = Arc::new(registry);

    let config = EngineConfig {
        retry_strategy: RetryStrategy::Constant {
            delay: Duration::from_secs(60),
        },
        resolve_attempts: 1,
        resolve_delay: Duration::from_millis(1),
        ..EngineConfig::default()
    };

    let dispatcher = Arc::new(MessageDispatcher::new(
        Arc::clone(&store) as Arc<dyn CampaignStore>,
        Arc::clone(&registry),
        config.clone(),
        Arc::clone(&metrics),
    ));
    let orchestrator = FunnelOrchestrator::new(
        Arc::clone(&store) as Arc<dyn CampaignStore>,
        dispatcher,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        steps,
        config.clone(),
    );
    let reconciler = WebhookReconciler::new(
        Arc::clone(&store) as Arc<dyn CampaignStore>,
        registry,
        config,
        metrics,
    );

    Harness {
        store,
        scheduler,
        orchestrator,
        reconciler,
        provider,
    }
}

fn two_step_pre_funnel() -> StepTable {
    StepTable::new().with_funnel(
        FunnelKind::PreEvent,
        vec![
            StepDefinition::new("reminder-24h", TimeDelta::hours(-24), Channel::Email, "t-24h"),
            StepDefinition::new("reminder-1h", TimeDelta::hours(-1), Channel::Email, "t-1h"),
        ],
    )
}

async fn seed_contact(store: &MemoryCampaignStore, contact_id: &str) {
    store
        .upsert_contact(
            ContactProfile::new(contact_id)
                .with_address(Channel::Email, "user@example.com")
                .with_consent(ConsentSnapshot::all_granted()),
        )
        .await
        .unwrap();
}

fn enrollment_for(contact_id: &str, event_time: DateTime<Utc>) -> Enrollment {
    Enrollment::new(
        contact_id,
        "event-1",
        event_time,
        event_time + TimeDelta::hours(1),
        ConsentSnapshot::all_granted(),
    )
}

fn webhook(event_id: &str, event_type: &str, message_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event_id": event_id,
        "event_type": event_type,
        "message_id": message_id,
    }))
    .unwrap()
}

#[tokio::test]
async fn pre_event_funnel_runs_to_completion() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    // Event already started: both reminder offsets are in the past.
    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();

    h.orchestrator.run_due(now).await.unwrap();
    h.orchestrator.run_due(now).await.unwrap();

    assert_eq!(h.provider.call_count(), 2);
    let wf = h.store.get_workflow(&workflow.id).await.unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert_eq!(wf.current_step_index, 2);

    let first = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, DispatchStatus::Sent);
}

#[tokio::test]
async fn future_step_waits_until_due() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let event_time = now + TimeDelta::hours(48);
    h.orchestrator
        .enroll(enrollment_for("contact-1", event_time))
        .await
        .unwrap();

    // Nothing is due yet: the first reminder fires at T-24h.
    h.orchestrator.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 0);

    let at_fire_time = event_time - TimeDelta::hours(24);
    h.orchestrator.run_due(at_fire_time).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn revoked_consent_skips_but_funnel_continues() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    h.store
        .upsert_contact(
            ContactProfile::new("contact-1")
                .with_address(Channel::Email, "user@example.com")
                .with_consent(ConsentSnapshot {
                    email: Some(false),
                    sms: None,
                }),
        )
        .await
        .unwrap();

    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();

    h.orchestrator.run_due(now).await.unwrap();
    h.orchestrator.run_due(now).await.unwrap();

    assert_eq!(h.provider.call_count(), 0);
    let wf = h.store.get_workflow(&workflow.id).await.unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);

    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DispatchStatus::Skipped);
}

#[tokio::test]
async fn transient_failure_retries_on_schedule() {
    let h = harness(ScriptedProvider::flaky(1), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();

    // First attempt fails; the retry is queued 60s out, not slept on.
    h.orchestrator.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);
    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DispatchStatus::Pending);

    // Not due yet.
    h.orchestrator.run_due(now + TimeDelta::seconds(30)).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);

    // Due now; the retry succeeds and the funnel advances.
    h.orchestrator.run_due(now + TimeDelta::seconds(90)).await.unwrap();
    assert_eq!(h.provider.call_count(), 2);
    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DispatchStatus::Sent);
    assert_eq!(record.attempt_count, 2);
}

#[tokio::test]
async fn engagement_webhooks_drive_the_status_lattice() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();
    h.orchestrator.run_due(now).await.unwrap();

    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    let message_id = record.provider_message_id.unwrap();

    let outcome = h
        .reconciler
        .ingest("scripted", &webhook("evt-1", "delivered", message_id.as_str()), "sig")
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Applied(DispatchStatus::Delivered));

    let outcome = h
        .reconciler
        .ingest("scripted", &webhook("evt-2", "opened", message_id.as_str()), "sig")
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Applied(DispatchStatus::Opened));

    // A late duplicate of the delivered event changes nothing.
    let outcome = h
        .reconciler
        .ingest("scripted", &webhook("evt-1", "delivered", message_id.as_str()), "sig")
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Duplicate);

    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DispatchStatus::Opened);
}

#[tokio::test]
async fn previous_step_opened_gates_follow_up() {
    let steps = StepTable::new().with_funnel(
        FunnelKind::PreEvent,
        vec![
            StepDefinition::new("teaser", TimeDelta::hours(-24), Channel::Email, "t-teaser"),
            StepDefinition::new("deep-dive", TimeDelta::hours(-1), Channel::Email, "t-deep")
                .with_precondition(StepPrecondition::PreviousStepOpened),
        ],
    );
    let h = harness(ScriptedProvider::reliable(), steps);
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();
    h.orchestrator.run_due(now).await.unwrap();

    // The teaser was opened, so the deep-dive goes out.
    let record = h
        .store
        .get_dispatch(&workflow.id, &"teaser".into())
        .await
        .unwrap()
        .unwrap();
    let message_id = record.provider_message_id.unwrap();
    h.reconciler
        .ingest("scripted", &webhook("evt-1", "opened", message_id.as_str()), "sig")
        .await
        .unwrap();

    h.orchestrator.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 2);
}

#[tokio::test]
async fn previous_step_not_opened_skips_follow_up() {
    let steps = StepTable::new().with_funnel(
        FunnelKind::PreEvent,
        vec![
            StepDefinition::new("teaser", TimeDelta::hours(-24), Channel::Email, "t-teaser"),
            StepDefinition::new("deep-dive", TimeDelta::hours(-1), Channel::Email, "t-deep")
                .with_precondition(StepPrecondition::PreviousStepOpened),
        ],
    );
    let h = harness(ScriptedProvider::reliable(), steps);
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();
    h.orchestrator.run_due(now).await.unwrap();
    h.orchestrator.run_due(now).await.unwrap();

    assert_eq!(h.provider.call_count(), 1);
    let record = h
        .store
        .get_dispatch(&workflow.id, &"deep-dive".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DispatchStatus::Skipped);

    let wf = h.store.get_workflow(&workflow.id).await.unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn attendance_starts_gated_post_event_funnel() {
    let steps = StepTable::new()
        .with_funnel(
            FunnelKind::PreEvent,
            vec![StepDefinition::new(
                "reminder",
                TimeDelta::hours(-1),
                Channel::Email,
                "t-reminder",
            )],
        )
        .with_funnel(
            FunnelKind::PostEvent,
            vec![
                StepDefinition::new("thanks", TimeDelta::hours(1), Channel::Email, "t-thanks")
                    .with_precondition(StepPrecondition::Attended),
                StepDefinition::new("replay", TimeDelta::hours(2), Channel::Email, "t-replay")
                    .with_precondition(StepPrecondition::NotAttended),
            ],
        );
    let h = harness(ScriptedProvider::reliable(), steps);
    seed_contact(&h.store, "contact-1").await;

    let event_time = Utc::now() - TimeDelta::hours(6);
    let enrollment = enrollment_for("contact-1", event_time);
    let enrollment_id = enrollment.id.clone();
    h.orchestrator.enroll(enrollment).await.unwrap();

    let attended_at = event_time + TimeDelta::minutes(5);
    let post = h
        .orchestrator
        .record_attendance(Attendance {
            enrollment_id,
            attended: true,
            attended_at: Some(attended_at),
        })
        .await
        .unwrap();
    assert_eq!(post.anchor_time, attended_at);

    let now = Utc::now();
    h.orchestrator.run_due(now).await.unwrap(); // pre reminder + post thanks
    h.orchestrator.run_due(now).await.unwrap(); // post replay (skipped)

    let thanks = h
        .store
        .get_dispatch(&post.id, &"thanks".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(thanks.status, DispatchStatus::Sent);

    let replay = h
        .store
        .get_dispatch(&post.id, &"replay".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replay.status, DispatchStatus::Skipped);
}

#[tokio::test]
async fn no_show_anchors_at_event_end() {
    let steps = StepTable::new()
        .with_funnel(
            FunnelKind::PreEvent,
            vec![StepDefinition::new(
                "reminder",
                TimeDelta::hours(-1),
                Channel::Email,
                "t-reminder",
            )],
        )
        .with_funnel(
            FunnelKind::PostEvent,
            vec![StepDefinition::new(
                "sorry",
                TimeDelta::hours(1),
                Channel::Email,
                "t-sorry",
            )
            .with_precondition(StepPrecondition::NotAttended)],
        );
    let h = harness(ScriptedProvider::reliable(), steps);
    seed_contact(&h.store, "contact-1").await;

    let event_time = Utc::now() - TimeDelta::hours(6);
    let enrollment = enrollment_for("contact-1", event_time);
    let event_end = enrollment.event_end_time;
    let enrollment_id = enrollment.id.clone();
    h.orchestrator.enroll(enrollment).await.unwrap();

    let post = h
        .orchestrator
        .record_attendance(Attendance {
            enrollment_id,
            attended: false,
            attended_at: None,
        })
        .await
        .unwrap();
    assert_eq!(post.anchor_time, event_end);
}

#[tokio::test]
async fn cancellation_stops_pending_steps() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let enrollment = enrollment_for("contact-1", now);
    let enrollment_id = enrollment.id.clone();
    let workflow = h.orchestrator.enroll(enrollment).await.unwrap();

    h.orchestrator.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);

    assert!(h.orchestrator.cancel_enrollment(&enrollment_id).await.unwrap());
    // Second cancel is a no-op.
    assert!(!h.orchestrator.cancel_enrollment(&enrollment_id).await.unwrap());

    h.orchestrator.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);

    let wf = h.store.get_workflow(&workflow.id).await.unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Cancelled);
}

#[tokio::test]
async fn restart_recovery_resumes_pending_waits() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    let event_time = now + TimeDelta::hours(48);
    let workflow = h
        .orchestrator
        .enroll(enrollment_for("contact-1", event_time))
        .await
        .unwrap();

    // Simulate a restart: a fresh scheduler and orchestrator over the same
    // store, with the old in-memory queue gone.
    let scheduler = Arc::new(MemoryScheduler::new());
    let metrics = Arc::new(EngineMetrics::new());
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::clone(&h.provider) as Arc<dyn DynProvider>);
    let config = EngineConfig::default();
    let dispatcher = Arc::new(MessageDispatcher::new(
        Arc::clone(&h.store) as Arc<dyn CampaignStore>,
        Arc::new(registry),
        config.clone(),
        metrics,
    ));
    let restarted = FunnelOrchestrator::new(
        Arc::clone(&h.store) as Arc<dyn CampaignStore>,
        dispatcher,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        two_step_pre_funnel(),
        config,
    );

    let recovered = restarted.recover(now).await.unwrap();
    assert_eq!(recovered, 1);

    // The poke lands before the fire time; the step is re-queued, not sent.
    restarted.run_due(now).await.unwrap();
    assert_eq!(h.provider.call_count(), 0);

    let at_fire_time = event_time - TimeDelta::hours(24);
    restarted.run_due(at_fire_time).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);

    // The pre-restart scheduler firing too adds nothing: the ledger
    // deduplicates the send.
    h.orchestrator.run_due(at_fire_time).await.unwrap();
    assert_eq!(h.provider.call_count(), 1);
    let record = h
        .store
        .get_dispatch(&workflow.id, &"reminder-24h".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.attempt_count, 1);
}

#[tokio::test]
async fn duplicate_enrollment_rejected() {
    let h = harness(ScriptedProvider::reliable(), two_step_pre_funnel());
    seed_contact(&h.store, "contact-1").await;

    let now = Utc::now();
    h.orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap();
    let err = h
        .orchestrator
        .enroll(enrollment_for("contact-1", now))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(h.scheduler.len().await, 1);
}
