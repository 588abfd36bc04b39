use serde::{Deserialize, Serialize};

/// Configuration for the SMTP email provider.
///
/// Sensible defaults are provided for common SMTP configurations (port 587,
/// TLS enabled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,

    /// SMTP server port. Defaults to 587 (STARTTLS submission port).
    pub smtp_port: u16,

    /// Optional SMTP username for authentication.
    pub username: Option<String>,

    /// Optional SMTP password for authentication.
    pub password: Option<String>,

    /// The `From` address used in outgoing emails.
    pub from_address: String,

    /// Domain used when generating `Message-ID` headers. Webhook events
    /// reference sends by this id.
    pub message_id_domain: String,

    /// Whether to use TLS for the SMTP connection. Defaults to `true`.
    pub tls: bool,

    /// Shared secret the delivery platform signs engagement callbacks
    /// with. Verification fails closed when unset.
    pub webhook_secret: Option<String>,
}

impl EmailConfig {
    /// Create a config with the given SMTP host and sender address, default
    /// port (587), TLS enabled, and no authentication.
    pub fn new(smtp_host: impl Into<String>, from_address: impl Into<String>) -> Self {
        let from_address = from_address.into();
        let message_id_domain = from_address
            .rsplit('@')
            .next()
            .unwrap_or("localhost")
            .to_owned();
        Self {
            smtp_host: smtp_host.into(),
            smtp_port: 587,
            username: None,
            password: None,
            from_address,
            message_id_domain,
            tls: true,
            webhook_secret: None,
        }
    }

    /// Set SMTP authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Override the default SMTP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    /// Set whether TLS should be used.
    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set the webhook signing secret.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self::new("localhost", "noreply@localhost")
    }
}
