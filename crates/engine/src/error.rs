use thiserror::Error;

use cadence_core::{Channel, EnrollmentId, FunnelKind, WorkflowId};
use cadence_state::StateError;

/// Errors that can occur inside the campaign engine.
///
/// Consent denials and permanent provider failures are *not* errors: they
/// are absorbed into dispatch record statuses (`skipped`, `failed`) and the
/// campaign continues. Only infrastructure and caller mistakes surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The campaign store failed; the triggering step execution should be
    /// retried as a whole by the outer scheduler.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// No provider is registered for the step's channel.
    #[error("no provider registered for channel {0}")]
    NoProvider(Channel),

    /// A webhook arrived for a provider name that is not registered.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A scheduled task referenced a workflow that does not exist.
    #[error("unknown workflow: {0}")]
    WorkflowNotFound(WorkflowId),

    /// An operation referenced an enrollment that does not exist.
    #[error("unknown enrollment: {0}")]
    EnrollmentNotFound(EnrollmentId),

    /// The step table has no sequence for the requested funnel.
    #[error("no steps defined for funnel {0}")]
    NoSteps(FunnelKind),

    /// The webhook body did not parse to the expected shape. The only
    /// ingestion failure the HTTP layer reports as a client error.
    #[error("malformed webhook payload: {0}")]
    MalformedWebhook(String),

    /// The webhook signature failed verification and the configured policy
    /// is to reject.
    #[error("webhook signature rejected")]
    SignatureRejected,
}
