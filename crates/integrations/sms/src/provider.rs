use reqwest::Client;
use tracing::{debug, instrument, warn};

use cadence_core::{Channel, ProviderMessageId};
use cadence_provider::signature::verify_hmac;
use cadence_provider::{Provider, ProviderError, SendReceipt, SendRequest};

use crate::config::SmsConfig;
use crate::error::SmsError;
use crate::types::{ApiErrorResponse, MessageResponse};

// Error codes for permanently undeliverable destinations.
const CODE_INVALID_TO: i64 = 21211;
const CODE_UNSUBSCRIBED: i64 = 21610;

/// SMS provider that sends messages through a Twilio-compatible REST API.
///
/// The message text comes from the send request's `body` template variable,
/// falling back to the template id. The API's message sid becomes the
/// provider message id for status-callback reconciliation.
pub struct SmsProvider {
    config: SmsConfig,
    client: Client,
}

impl SmsProvider {
    /// Create a provider with a default HTTP client and a 30s timeout.
    pub fn new(config: SmsConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Create a provider with a custom HTTP client.
    ///
    /// Useful for testing or for sharing a connection pool.
    pub fn with_client(config: SmsConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_base_url, self.config.account_sid
        )
    }

    async fn create_message(&self, to: &str, body: &str) -> Result<MessageResponse, SmsError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("SMS API rate limit hit");
            return Err(SmsError::RateLimited);
        }

        if !status.is_success() {
            let error: ApiErrorResponse = response
                .json()
                .await
                .unwrap_or(ApiErrorResponse {
                    code: None,
                    message: None,
                });
            let message = error.message.unwrap_or_else(|| format!("HTTP {status}"));
            return Err(match error.code {
                Some(CODE_INVALID_TO) => SmsError::InvalidNumber(message),
                Some(CODE_UNSUBSCRIBED) => SmsError::OptedOut(message),
                _ => SmsError::Api(message),
            });
        }

        Ok(response.json().await?)
    }
}

impl Provider for SmsProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "sms"
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }

    #[instrument(skip(self, request), fields(provider = "sms", template_id = %request.template_id))]
    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, ProviderError> {
        let body = request.variables["body"]
            .as_str()
            .unwrap_or(&request.template_id);

        debug!(to = %request.destination, "sending SMS");
        let response = self.create_message(&request.destination, body).await?;

        debug!(sid = %response.sid, status = ?response.status, "SMS accepted");
        Ok(SendReceipt {
            provider_message_id: ProviderMessageId::new(response.sid),
        })
    }

    fn verify_signature(&self, raw_payload: &[u8], signature_header: &str) -> bool {
        match &self.config.webhook_secret {
            Some(secret) => verify_hmac(secret, raw_payload, signature_header),
            // No secret on file: nothing can be trusted.
            None => false,
        }
    }
}
