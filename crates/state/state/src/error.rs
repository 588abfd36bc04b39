use thiserror::Error;

/// Errors from campaign store operations.
///
/// `Unavailable` is the infrastructure-failure case: it propagates to the
/// caller of the step execution so the outer scheduler can retry the whole
/// invocation (the idempotency ledger makes that safe).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
