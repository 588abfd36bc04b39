use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during provider operations.
///
/// The transient/permanent split drives the dispatcher's retry decision:
/// transient errors are retried with backoff, permanent errors fail the
/// dispatch immediately.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The destination address or number is malformed or does not exist.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The recipient has unsubscribed at the provider level.
    #[error("recipient unsubscribed: {0}")]
    Unsubscribed(String),

    /// The provider failed to execute the send.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The provider did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// The provider was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// Returns `true` if the error is transient and the send may succeed on
    /// retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ProviderError::Connection("reset".into()).is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!ProviderError::InvalidDestination("bad".into()).is_retryable());
        assert!(!ProviderError::Unsubscribed("user".into()).is_retryable());
        assert!(!ProviderError::ExecutionFailed("boom".into()).is_retryable());
        assert!(!ProviderError::Configuration("missing key".into()).is_retryable());
        assert!(!ProviderError::Serialization("bad json".into()).is_retryable());
    }
}
