//! Single-attempt message dispatch.
//!
//! The dispatcher performs exactly one send attempt per invocation and
//! reports whether the step settled or wants a retry later. It never sleeps:
//! retry delays are returned to the orchestrator, which turns them into
//! scheduled tasks so a restart resumes the backoff instead of losing it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use cadence_core::{Channel, DispatchRecord, DispatchStatus, StepDefinition, WorkflowId};
use cadence_provider::{ProviderRegistry, SendRequest};
use cadence_state::{AuditEntry, CampaignStore, ContactProfile, TransitionResult};

use crate::config::EngineConfig;
use crate::consent;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;

/// Result of one dispatch attempt for a step.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The step settled: sent, skipped, already handled earlier, or failed
    /// permanently. The workflow can advance past it.
    Completed(DispatchRecord),
    /// The attempt hit a transient provider error and should be retried
    /// after `delay`. The record stays `Pending`.
    RetryAfter {
        /// The still-pending record.
        record: DispatchRecord,
        /// Backoff before the next attempt.
        delay: Duration,
    },
}

/// Executes sends against the provider registry, gated by consent and
/// deduplicated through the dispatch ledger.
pub struct MessageDispatcher {
    store: Arc<dyn CampaignStore>,
    registry: Arc<ProviderRegistry>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl MessageDispatcher {
    /// Create a dispatcher over the given store and providers.
    pub fn new(
        store: Arc<dyn CampaignStore>,
        registry: Arc<ProviderRegistry>,
        config: EngineConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            metrics,
        }
    }

    /// Perform one dispatch attempt for a funnel step.
    ///
    /// Idempotent per `(workflow_id, step_id)`: if the ledger already holds
    /// a non-pending record for the key, no provider is called and the
    /// existing record comes back as [`DispatchOutcome::Completed`]. Consent
    /// is read from the contact profile at call time and fails closed.
    #[instrument(skip(self, step, contact), fields(
        workflow_id = %workflow_id,
        step_id = %step.step_id,
        channel = %step.channel,
    ))]
    pub async fn dispatch_step(
        &self,
        workflow_id: &WorkflowId,
        step: &StepDefinition,
        contact: &ContactProfile,
    ) -> Result<DispatchOutcome, EngineError> {
        let record = self
            .store
            .find_or_create_dispatch(workflow_id, &step.step_id, step.channel)
            .await?;

        if record.status != DispatchStatus::Pending {
            info!(status = %record.status, "dispatch already settled, skipping send");
            return Ok(DispatchOutcome::Completed(record));
        }

        self.metrics.increment_dispatched();

        if !consent::allowed(&contact.consent, step.channel) {
            return self
                .settle(
                    workflow_id,
                    &step.step_id,
                    step.channel,
                    DispatchStatus::Skipped,
                    "skipped_consent",
                    json!({ "contact_id": contact.contact_id.as_str() }),
                )
                .await;
        }

        let Some(destination) = contact.address(step.channel) else {
            return self
                .settle(
                    workflow_id,
                    &step.step_id,
                    step.channel,
                    DispatchStatus::Skipped,
                    "skipped_no_address",
                    json!({ "contact_id": contact.contact_id.as_str() }),
                )
                .await;
        };

        let provider = self
            .registry
            .for_channel(step.channel)
            .ok_or(EngineError::NoProvider(step.channel))?;

        let request = SendRequest::new(step.channel, destination, step.template_id.clone())
            .with_variables(json!({ "contact_id": contact.contact_id.as_str() }));

        let attempts = self
            .store
            .increment_dispatch_attempts(workflow_id, &step.step_id)
            .await?;

        match provider.send(&request).await {
            Ok(receipt) => {
                info!(
                    provider = provider.name(),
                    provider_message_id = %receipt.provider_message_id,
                    attempts,
                    "message sent"
                );
                let result = self
                    .store
                    .transition_dispatch(
                        workflow_id,
                        &step.step_id,
                        DispatchStatus::Sent,
                        Some(receipt.provider_message_id.clone()),
                    )
                    .await?;
                let record = match result {
                    TransitionResult::Applied(record) | TransitionResult::Stale(record) => record,
                };
                self.metrics.increment_sent();
                self.audit(
                    workflow_id,
                    &step.step_id,
                    step.channel,
                    "sent",
                    json!({
                        "provider": provider.name(),
                        "provider_message_id": receipt.provider_message_id.as_str(),
                        "attempts": attempts,
                    }),
                )
                .await?;
                Ok(DispatchOutcome::Completed(record))
            }
            Err(err) if err.is_retryable() && attempts < self.config.max_attempts => {
                let delay = self.config.retry_strategy.delay_for(attempts - 1);
                warn!(
                    provider = provider.name(),
                    error = %err,
                    attempts,
                    delay_secs = delay.as_secs(),
                    "transient send failure, will retry"
                );
                self.metrics.increment_retries();
                self.audit(
                    workflow_id,
                    &step.step_id,
                    step.channel,
                    "retry",
                    json!({
                        "provider": provider.name(),
                        "error": err.to_string(),
                        "attempts": attempts,
                    }),
                )
                .await?;
                let record = self
                    .store
                    .get_dispatch(workflow_id, &step.step_id)
                    .await?
                    .unwrap_or(record);
                Ok(DispatchOutcome::RetryAfter { record, delay })
            }
            Err(err) => {
                warn!(
                    provider = provider.name(),
                    error = %err,
                    attempts,
                    retryable = err.is_retryable(),
                    "send failed permanently"
                );
                self.settle(
                    workflow_id,
                    &step.step_id,
                    step.channel,
                    DispatchStatus::Failed,
                    "failed",
                    json!({
                        "provider": provider.name(),
                        "error": err.to_string(),
                        "attempts": attempts,
                    }),
                )
                .await
            }
        }
    }

    /// Send a one-off message outside any funnel.
    ///
    /// The send is recorded in the dispatch ledger under a synthetic
    /// workflow id so webhook events for it still reconcile. Single shot:
    /// transient failures are not retried.
    #[instrument(skip(self, contact, variables), fields(
        contact_id = %contact.contact_id,
        channel = %channel,
        template_id,
    ))]
    pub async fn dispatch_manual(
        &self,
        contact: &ContactProfile,
        channel: Channel,
        template_id: &str,
        variables: serde_json::Value,
    ) -> Result<DispatchRecord, EngineError> {
        let workflow_id = WorkflowId::new(format!("manual:{}", Uuid::new_v4()));
        let step_id = cadence_core::StepId::new("manual");

        let record = self
            .store
            .find_or_create_dispatch(&workflow_id, &step_id, channel)
            .await?;
        self.metrics.increment_dispatched();

        if !consent::allowed(&contact.consent, channel) {
            let outcome = self
                .settle(
                    &workflow_id,
                    &step_id,
                    channel,
                    DispatchStatus::Skipped,
                    "skipped_consent",
                    json!({ "contact_id": contact.contact_id.as_str() }),
                )
                .await?;
            return Ok(completed_record(outcome, record));
        }

        let Some(destination) = contact.address(channel) else {
            let outcome = self
                .settle(
                    &workflow_id,
                    &step_id,
                    channel,
                    DispatchStatus::Skipped,
                    "skipped_no_address",
                    json!({ "contact_id": contact.contact_id.as_str() }),
                )
                .await?;
            return Ok(completed_record(outcome, record));
        };

        let provider = self
            .registry
            .for_channel(channel)
            .ok_or(EngineError::NoProvider(channel))?;

        let request = SendRequest::new(channel, destination, template_id).with_variables(variables);
        self.store
            .increment_dispatch_attempts(&workflow_id, &step_id)
            .await?;

        match provider.send(&request).await {
            Ok(receipt) => {
                let result = self
                    .store
                    .transition_dispatch(
                        &workflow_id,
                        &step_id,
                        DispatchStatus::Sent,
                        Some(receipt.provider_message_id.clone()),
                    )
                    .await?;
                self.metrics.increment_sent();
                self.audit(
                    &workflow_id,
                    &step_id,
                    channel,
                    "sent",
                    json!({
                        "provider": provider.name(),
                        "provider_message_id": receipt.provider_message_id.as_str(),
                    }),
                )
                .await?;
                Ok(match result {
                    TransitionResult::Applied(record) | TransitionResult::Stale(record) => record,
                })
            }
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "manual send failed");
                let outcome = self
                    .settle(
                        &workflow_id,
                        &step_id,
                        channel,
                        DispatchStatus::Failed,
                        "failed",
                        json!({
                            "provider": provider.name(),
                            "error": err.to_string(),
                        }),
                    )
                    .await?;
                Ok(completed_record(outcome, record))
            }
        }
    }

    /// Move the record to a terminal status and audit the outcome.
    async fn settle(
        &self,
        workflow_id: &WorkflowId,
        step_id: &cadence_core::StepId,
        channel: Channel,
        status: DispatchStatus,
        outcome: &str,
        detail: serde_json::Value,
    ) -> Result<DispatchOutcome, EngineError> {
        info!(status = %status, outcome, "dispatch settled without delivery");
        let result = self
            .store
            .transition_dispatch(workflow_id, step_id, status, None)
            .await?;
        match status {
            DispatchStatus::Skipped => self.metrics.increment_skipped(),
            DispatchStatus::Failed => self.metrics.increment_failed(),
            _ => {}
        }
        self.audit(workflow_id, step_id, channel, outcome, detail)
            .await?;
        let record = match result {
            TransitionResult::Applied(record) | TransitionResult::Stale(record) => record,
        };
        Ok(DispatchOutcome::Completed(record))
    }

    async fn audit(
        &self,
        workflow_id: &WorkflowId,
        step_id: &cadence_core::StepId,
        channel: Channel,
        outcome: &str,
        detail: serde_json::Value,
    ) -> Result<(), EngineError> {
        let entry = AuditEntry::new(workflow_id.clone(), step_id.clone(), channel, outcome, detail);
        self.store.append_audit(entry).await?;
        Ok(())
    }
}

fn completed_record(outcome: DispatchOutcome, fallback: DispatchRecord) -> DispatchRecord {
    match outcome {
        DispatchOutcome::Completed(record) => record,
        DispatchOutcome::RetryAfter { .. } => fallback,
    }
}
