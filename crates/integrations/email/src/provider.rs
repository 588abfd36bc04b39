use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use cadence_core::{Channel, ProviderMessageId};
use cadence_provider::signature::verify_hmac;
use cadence_provider::{Provider, ProviderError, SendReceipt, SendRequest};

use crate::config::EmailConfig;

/// An email provider that sends messages via SMTP using `lettre`.
///
/// The subject and body come from the send request's template variables
/// (`subject`, `body`, `html_body`); rendering happens upstream. Each send
/// gets a generated `Message-ID` which doubles as the provider message id,
/// so engagement callbacks from the delivery platform can be matched back
/// to the dispatch record.
pub struct EmailProvider {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailProvider")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl EmailProvider {
    /// Create a provider from the given configuration.
    ///
    /// Returns [`ProviderError::Configuration`] if the SMTP transport
    /// cannot be built (e.g. invalid host).
    pub fn new(config: EmailConfig) -> Result<Self, ProviderError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    /// Create a provider with a pre-built transport, for tests.
    pub fn with_transport(
        config: EmailConfig,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    ) -> Self {
        Self { config, transport }
    }
}

/// Build a `lettre::Message` for the request with the given message id.
///
/// A free function so it can be tested without the async SMTP transport
/// (which requires a Tokio runtime to construct).
fn build_message(
    config: &EmailConfig,
    request: &SendRequest,
    message_id: &str,
) -> Result<Message, ProviderError> {
    let from_mailbox: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| ProviderError::Configuration(format!("invalid from address: {e}")))?;

    let to_mailbox: Mailbox = request
        .destination
        .parse()
        .map_err(|e| ProviderError::InvalidDestination(format!("{}: {e}", request.destination)))?;

    let subject = request.variables["subject"]
        .as_str()
        .unwrap_or(&request.template_id);

    let builder = Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(subject)
        .message_id(Some(format!("<{message_id}>")));

    let text = request.variables["body"].as_str();
    let html = request.variables["html_body"].as_str();

    let message = match (text, html) {
        (Some(text), Some(html)) => builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_owned()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_owned()),
                    ),
            )
            .map_err(|e| ProviderError::ExecutionFailed(format!("failed to build email: {e}")))?,
        (None, Some(html)) => builder
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.to_owned()),
            )
            .map_err(|e| ProviderError::ExecutionFailed(format!("failed to build email: {e}")))?,
        (text, None) => builder
            .body(text.unwrap_or_default().to_owned())
            .map_err(|e| ProviderError::ExecutionFailed(format!("failed to build email: {e}")))?,
    };

    Ok(message)
}

/// Build an async SMTP transport from the given configuration.
fn build_transport(
    config: &EmailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, ProviderError> {
    let builder = if config.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ProviderError::Configuration(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Map a lettre SMTP error to the appropriate `ProviderError` variant.
fn map_smtp_error(error: &lettre::transport::smtp::Error) -> ProviderError {
    let message = error.to_string();

    if error.is_transient() {
        ProviderError::Connection(format!("transient SMTP error: {message}"))
    } else if error.is_permanent() {
        ProviderError::ExecutionFailed(format!("permanent SMTP error: {message}"))
    } else {
        // Covers TLS, connection, response parsing, and other errors.
        ProviderError::Connection(format!("SMTP error: {message}"))
    }
}

impl Provider for EmailProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "email"
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }

    #[instrument(skip(self, request), fields(provider = "email", template_id = %request.template_id))]
    async fn send(&self, request: &SendRequest) -> Result<SendReceipt, ProviderError> {
        let message_id = format!("{}@{}", Uuid::new_v4(), self.config.message_id_domain);

        debug!(to = %request.destination, "building email message");
        let message = build_message(&self.config, request, &message_id)?;

        info!(to = %request.destination, %message_id, "sending email");
        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(&e)
        })?;

        Ok(SendReceipt {
            provider_message_id: ProviderMessageId::new(message_id),
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
