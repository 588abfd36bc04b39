use serde::{Deserialize, Serialize};

use cadence_core::{Channel, ProviderMessageId};

/// One logical send handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Channel the message goes out on.
    pub channel: Channel,

    /// Destination address (email) or number (SMS) for the channel.
    pub destination: String,

    /// Template the provider renders.
    pub template_id: String,

    /// Template variables, already resolved by the caller.
    #[serde(default)]
    pub variables: serde_json::Value,
}

impl SendRequest {
    /// Create a request with no template variables.
    #[must_use]
    pub fn new(
        channel: Channel,
        destination: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            destination: destination.into(),
            template_id: template_id.into(),
            variables: serde_json::Value::Null,
        }
    }

    /// Attach template variables.
    #[must_use]
    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = variables;
        self
    }
}

/// Acknowledgement returned by a provider for an accepted send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Message identifier assigned by the provider. Stored on the dispatch
    /// record so later webhook events can be resolved back to it.
    pub provider_message_id: ProviderMessageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = SendRequest::new(Channel::Email, "user@example.com", "welcome")
            .with_variables(serde_json::json!({"name": "Ada"}));
        assert_eq!(req.destination, "user@example.com");
        assert_eq!(req.variables["name"], "Ada");
    }

    #[test]
    fn receipt_serde_roundtrip() {
        let receipt = SendReceipt {
            provider_message_id: ProviderMessageId::new("msg-1"),
        };
        let json = serde_json::to_string(&receipt).unwrap();
        let back: SendReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.provider_message_id.as_str(), "msg-1");
    }
}
