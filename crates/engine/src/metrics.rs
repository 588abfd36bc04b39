use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for engine activity, shared across the dispatcher, reconciler,
/// and orchestrator.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    dispatched: AtomicU64,
    sent: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    webhooks_applied: AtomicU64,
    webhooks_duplicate: AtomicU64,
    webhooks_out_of_order: AtomicU64,
    webhooks_invalid_signature: AtomicU64,
    webhooks_unresolved: AtomicU64,
}

macro_rules! counter {
    ($increment:ident, $get:ident, $field:ident) => {
        pub fn $increment(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        #[must_use]
        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl EngineMetrics {
    /// Create a fresh set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_dispatched, dispatched, dispatched);
    counter!(increment_sent, sent, sent);
    counter!(increment_skipped, skipped, skipped);
    counter!(increment_failed, failed, failed);
    counter!(increment_retries, retries, retries);
    counter!(increment_webhooks_applied, webhooks_applied, webhooks_applied);
    counter!(
        increment_webhooks_duplicate,
        webhooks_duplicate,
        webhooks_duplicate
    );
    counter!(
        increment_webhooks_out_of_order,
        webhooks_out_of_order,
        webhooks_out_of_order
    );
    counter!(
        increment_webhooks_invalid_signature,
        webhooks_invalid_signature,
        webhooks_invalid_signature
    );
    counter!(
        increment_webhooks_unresolved,
        webhooks_unresolved,
        webhooks_unresolved
    );
}
