use serde::Deserialize;

use cadence_core::StepDefinition;
use cadence_email::EmailConfig;
use cadence_engine::SignaturePolicy;
use cadence_sms::SmsConfig;

/// Top-level configuration for the Cadence server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct CadenceConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineSection,
    /// Funnel step sequences.
    #[serde(default)]
    pub funnels: FunnelsConfig,
    /// SMTP email provider. Omit the section to disable the channel.
    pub email: Option<EmailConfig>,
    /// SMS provider. Omit the section to disable the channel.
    pub sms: Option<SmsConfig>,
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

/// Engine tuning. Absent values fall back to the engine defaults.
#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    /// Maximum send attempts per step.
    pub max_attempts: Option<u32>,
    /// Initial retry backoff in seconds.
    pub retry_base_seconds: Option<u64>,
    /// Upper bound on retry backoff in seconds.
    pub retry_max_seconds: Option<u64>,
    /// Scheduler poll interval in seconds.
    pub poll_interval_seconds: Option<u64>,
    /// What to do with webhooks whose signature fails verification.
    pub signature_policy: Option<SignaturePolicy>,
}

/// Step sequences per funnel, in execution order.
#[derive(Debug, Default, Deserialize)]
pub struct FunnelsConfig {
    /// Reminder sequence before the event, offsets relative to event start.
    #[serde(default)]
    pub pre_event: Vec<StepDefinition>,
    /// Follow-up sequence after the event, offsets relative to attendance.
    #[serde(default)]
    pub post_event: Vec<StepDefinition>,
}

#[cfg(test)]
mod tests {
    use cadence_core::{Channel, StepPrecondition};
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.email.is_none());
        assert!(config.sms.is_none());
        assert!(config.funnels.pre_event.is_empty());
        assert!(config.engine.max_attempts.is_none());
    }

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 9090

            [engine]
            max_attempts = 3
            retry_base_seconds = 30
            signature_policy = "reject"

            [email]
            smtp_host = "smtp.example.com"
            smtp_port = 587
            from_address = "noreply@example.com"
            message_id_domain = "example.com"
            tls = true
            webhook_secret = "hunter2"

            [[funnels.pre_event]]
            step_id = "reminder-24h"
            offset = -86400
            channel = "email"
            template_id = "tmpl-reminder"
            precondition = "always"

            [[funnels.post_event]]
            step_id = "replay"
            offset = 3600
            channel = "email"
            template_id = "tmpl-replay"
            precondition = "not_attended"
        "#;
        let config: CadenceConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.engine.max_attempts, Some(3));
        assert_eq!(config.engine.signature_policy, Some(SignaturePolicy::Reject));

        let email = config.email.unwrap();
        assert_eq!(email.smtp_host, "smtp.example.com");
        assert_eq!(email.webhook_secret.as_deref(), Some("hunter2"));

        assert_eq!(config.funnels.pre_event.len(), 1);
        let step = &config.funnels.pre_event[0];
        assert_eq!(step.offset, TimeDelta::hours(-24));
        assert_eq!(step.channel, Channel::Email);
        assert_eq!(
            config.funnels.post_event[0].precondition,
            StepPrecondition::NotAttended
        );
    }
}
