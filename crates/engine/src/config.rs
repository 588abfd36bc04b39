use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryStrategy;

/// What to do with a webhook whose signature fails verification.
///
/// Most providers blindly retry non-2xx responses, so the default accepts
/// the request externally while recording the failure internally. `Reject`
/// is for providers whose retry semantics are trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    /// Return success to the provider; persist the event with
    /// `signature_valid=false` and surface it through metrics and logs.
    #[default]
    AcceptAndRecord,
    /// Surface the failure to the HTTP layer as a client error.
    Reject,
}

/// Configuration for the dispatch, reconciliation, and orchestration
/// pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum send attempts per step before the dispatch record fails.
    pub max_attempts: u32,
    /// Strategy used to compute the delay between retries.
    pub retry_strategy: RetryStrategy,
    /// Policy for invalid webhook signatures.
    pub signature_policy: SignaturePolicy,
    /// How many times the reconciler retries resolving a webhook's target
    /// dispatch record before parking it as unresolved.
    pub resolve_attempts: u32,
    /// Delay between resolution retries.
    pub resolve_delay: Duration,
    /// How often the runner polls the scheduler for due steps.
    pub poll_interval: Duration,
    /// How long to wait before re-scheduling a step whose execution hit a
    /// store failure.
    pub reschedule_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_strategy: RetryStrategy::default(),
            signature_policy: SignaturePolicy::default(),
            resolve_attempts: 3,
            resolve_delay: Duration::from_millis(50),
            poll_interval: Duration::from_secs(5),
            reschedule_delay: Duration::from_secs(30),
        }
    }
}
