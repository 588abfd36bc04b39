//! Webhook reconciliation.
//!
//! Inbound provider callbacks (delivery receipts, opens, clicks, bounces,
//! complaints) are verified against the exact raw payload bytes, logged in
//! the deduplicating event ledger, and then folded into the dispatch record
//! they belong to. The status lattice is forward-only, so late or duplicate
//! callbacks can never regress a record.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use cadence_core::{DispatchStatus, EngagementKind, ProviderEvent, ProviderId, ProviderMessageId};
use cadence_provider::ProviderRegistry;
use cadence_state::{CampaignStore, EventInsert, TransitionResult, UnresolvedEvent};

use crate::config::{EngineConfig, SignaturePolicy};
use crate::error::EngineError;
use crate::metrics::EngineMetrics;

/// How an inbound webhook was handled. Every variant except the error path
/// is reported to the provider as success so it stops redelivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The engagement was folded into the dispatch record.
    Applied(DispatchStatus),
    /// The record was already at or past the target status; the event is
    /// ledgered and marked processed but changed nothing.
    OutOfOrder,
    /// An event with the same `(provider, external_event_id)` was already
    /// fully processed.
    Duplicate,
    /// The signature failed verification under the `AcceptAndRecord`
    /// policy: the event is ledgered as unverified and not applied.
    InvalidSignature,
    /// No dispatch record matched the provider message id; the event is
    /// parked for manual reconciliation.
    Unresolved,
}

/// The payload shape every provider adapter normalizes its callbacks to.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    /// Provider-assigned event identifier, unique per provider.
    event_id: String,
    /// The engagement signal.
    event_type: EngagementKind,
    /// The provider message id issued at send time.
    message_id: String,
}

/// Ingests provider callbacks and reconciles them with dispatch records.
pub struct WebhookReconciler {
    store: Arc<dyn CampaignStore>,
    registry: Arc<ProviderRegistry>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl WebhookReconciler {
    /// Create a reconciler over the given store and providers.
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

    /// Process one raw webhook callback.
    ///
    /// `raw_payload` must be the unparsed request body: signatures are
    /// computed over exact bytes and re-serialization would break
    /// verification. Returns [`EngineError::MalformedWebhook`] only when the
    /// body cannot be parsed; everything else, including duplicates and
    /// unresolvable events, is a success from the provider's point of view.
    #[instrument(skip(self, raw_payload, signature_header), fields(provider = provider_name))]
    pub async fn ingest(
        &self,
        provider_name: &str,
        raw_payload: &[u8],
        signature_header: &str,
    ) -> Result<IngestOutcome, EngineError> {
        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| EngineError::UnknownProvider(provider_name.to_owned()))?;

        let signature_valid = provider.verify_signature(raw_payload, signature_header);
        if !signature_valid && self.config.signature_policy == SignaturePolicy::Reject {
            warn!("webhook signature rejected");
            self.metrics.increment_webhooks_invalid_signature();
            return Err(EngineError::SignatureRejected);
        }

        let payload: WebhookPayload = serde_json::from_slice(raw_payload)
            .map_err(|e| EngineError::MalformedWebhook(e.to_string()))?;

        let provider_id = ProviderId::new(provider_name);
        let event = ProviderEvent::new(
            provider_id.clone(),
            payload.event_id.clone(),
            payload.event_type,
            signature_valid,
        );

        match self.store.insert_provider_event(event).await? {
            EventInsert::Duplicate(existing) if existing.processed => {
                info!(external_event_id = %payload.event_id, "duplicate webhook ignored");
                self.metrics.increment_webhooks_duplicate();
                return Ok(IngestOutcome::Duplicate);
            }
            // An unprocessed duplicate means a previous delivery crashed
            // between ledger insert and record update; run it to completion.
            EventInsert::Duplicate(_) | EventInsert::Inserted => {}
        }

        if !signature_valid {
            warn!(
                external_event_id = %payload.event_id,
                "webhook signature invalid, event recorded but not applied"
            );
            self.metrics.increment_webhooks_invalid_signature();
            return Ok(IngestOutcome::InvalidSignature);
        }

        let message_id = ProviderMessageId::new(payload.message_id.clone());
        let Some(record) = self.resolve_record(&message_id).await? else {
            warn!(
                external_event_id = %payload.event_id,
                provider_message_id = %message_id,
                "webhook target not found, parking as unresolved"
            );
            self.store
                .record_unresolved_event(UnresolvedEvent {
                    provider: provider_id.clone(),
                    external_event_id: payload.event_id.clone(),
                    event_type: payload.event_type,
                    provider_message_id: message_id,
                    reason: "no dispatch record for provider message id".to_owned(),
                    received_at: chrono::Utc::now(),
                })
                .await?;
            self.store
                .mark_event_processed(&provider_id, &payload.event_id)
                .await?;
            self.metrics.increment_webhooks_unresolved();
            return Ok(IngestOutcome::Unresolved);
        };

        let target = payload.event_type.target_status();
        let result = self
            .store
            .transition_dispatch(&record.workflow_id, &record.step_id, target, None)
            .await?;

        // Mark processed only after the record update committed, so a crash
        // in between leads to reprocessing instead of a lost update.
        self.store
            .mark_event_processed(&provider_id, &payload.event_id)
            .await?;

        match result {
            TransitionResult::Applied(record) => {
                info!(
                    workflow_id = %record.workflow_id,
                    step_id = %record.step_id,
                    status = %record.status,
                    "engagement applied"
                );
                self.metrics.increment_webhooks_applied();
                Ok(IngestOutcome::Applied(target))
            }
            TransitionResult::Stale(record) => {
                info!(
                    workflow_id = %record.workflow_id,
                    step_id = %record.step_id,
                    status = %record.status,
                    target = %target,
                    "out-of-order engagement ignored"
                );
                self.metrics.increment_webhooks_out_of_order();
                Ok(IngestOutcome::OutOfOrder)
            }
        }
    }

    /// Look up the dispatch record for a provider message id, retrying a
    /// few times to cover the race where the callback arrives before the
    /// sender has committed the id to the record.
    async fn resolve_record(
        &self,
        message_id: &ProviderMessageId,
    ) -> Result<Option<cadence_core::DispatchRecord>, EngineError> {
        for attempt in 0..self.config.resolve_attempts {
            if let Some(record) = self
                .store
                .find_dispatch_by_provider_message_id(message_id)
                .await?
            {
                return Ok(Some(record));
            }
            if attempt + 1 < self.config.resolve_attempts {
                tokio::time::sleep(self.config.resolve_delay).await;
            }
        }
        Ok(None)
    }
}
