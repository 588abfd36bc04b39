use thiserror::Error;

use cadence_provider::ProviderError;

/// Errors from the SMS REST API.
#[derive(Debug, Error)]
pub enum SmsError {
    /// The destination number was rejected by the API.
    #[error("invalid destination number: {0}")]
    InvalidNumber(String),

    /// The recipient has opted out at the carrier or provider level.
    #[error("recipient opted out: {0}")]
    OptedOut(String),

    /// The API returned an error response.
    #[error("API error: {0}")]
    Api(String),

    /// The API rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// An HTTP transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<SmsError> for ProviderError {
    fn from(err: SmsError) -> Self {
        match err {
            SmsError::InvalidNumber(msg) => ProviderError::InvalidDestination(msg),
            SmsError::OptedOut(msg) => ProviderError::Unsubscribed(msg),
            SmsError::Api(msg) => ProviderError::ExecutionFailed(msg),
            SmsError::RateLimited => ProviderError::RateLimited,
            SmsError::Http(e) if e.is_timeout() => {
                ProviderError::Timeout(std::time::Duration::from_secs(30))
            }
            SmsError::Http(e) => ProviderError::Connection(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_number_maps_to_permanent_error() {
        let err: ProviderError = SmsError::InvalidNumber("+1555".into()).into();
        assert!(matches!(err, ProviderError::InvalidDestination(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn opt_out_maps_to_unsubscribed() {
        let err: ProviderError = SmsError::OptedOut("+15551234567".into()).into();
        assert!(matches!(err, ProviderError::Unsubscribed(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err: ProviderError = SmsError::RateLimited.into();
        assert!(err.is_retryable());
    }
}
