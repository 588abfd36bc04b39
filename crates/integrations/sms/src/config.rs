use serde::{Deserialize, Serialize};

/// Configuration for the SMS provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Account identifier used in the API path and for basic auth.
    pub account_sid: String,

    /// Auth token paired with the account sid.
    pub auth_token: String,

    /// Sender number in E.164 format (e.g. `+15551234567`).
    pub from_number: String,

    /// Base URL of the messaging API. Override this for testing against a
    /// mock server.
    pub api_base_url: String,

    /// Shared secret status callbacks are signed with. Verification fails
    /// closed when unset.
    pub webhook_secret: Option<String>,
}

impl SmsConfig {
    /// Create a configuration with the default Twilio API base URL.
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            api_base_url: "https://api.twilio.com/2010-04-01".to_owned(),
            webhook_secret: None,
        }
    }

    /// Override the API base URL (useful for testing).
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the webhook signing secret.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}
