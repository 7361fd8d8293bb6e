//! Transport selection and single-attempt delivery orchestration.
//!
//! The transport is chosen once at startup from configuration, not per
//! request: `relay` uses the lettre SMTP client, `builtin` the
//! hand-written protocol client. Either way the dispatcher performs
//! exactly one delivery attempt per submission and produces exactly one
//! result.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use crate::config::{DeliveryConfig, TransportKind, FROM_NAME, TO_EMAIL};
use crate::envelope::Envelope;
use crate::errors::{ConfigError, TransportError};
use crate::smtp::{SmtpClient, TcpDialer};
use crate::submission::Submission;

pub const SUCCESS_MESSAGE: &str = "Thank you for your message! We'll get back to you soon.";

/// User-safe failure text. Includes the fallback address so the form's
/// purpose survives a delivery outage.
pub fn delivery_failure_message() -> String {
    format!(
        "Sorry, there was an error sending your message. \
         Please try again later or contact us directly at {TO_EMAIL}"
    )
}

/// Message handed to a transport: envelope addresses plus rendered
/// content. The envelope sender is always the system address; the
/// visitor's address only ever appears as `Reply-To`.
#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
}

/// One delivery attempt. Implementations must not retry.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, mail: &OutboundMail) -> Result<(), TransportError>;
}

/// The trusted client path: lettre's STARTTLS relay transport.
pub struct RelayTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl RelayTransport {
    pub fn new(config: &DeliveryConfig) -> Result<Self, ConfigError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ConfigError::RelaySetup(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for RelayTransport {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, mail: &OutboundMail) -> Result<(), TransportError> {
        let relay_err = |e: &dyn std::fmt::Display| TransportError::Relay(e.to_string());

        let from = format!("{} <{}>", mail.from_name, mail.from_email)
            .parse()
            .map_err(|e| relay_err(&e))?;
        let mut builder = Message::builder()
            .from(from)
            .to(mail.to_email.parse().map_err(|e| relay_err(&e))?)
            .subject(mail.subject.clone());
        if let Some(reply_to) = &mail.reply_to {
            builder = builder.reply_to(reply_to.parse().map_err(|e| relay_err(&e))?);
        }
        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .map_err(|e| relay_err(&e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| relay_err(&e))?;
        Ok(())
    }
}

/// The fallback path: the hand-written protocol client.
pub struct BuiltinTransport {
    client: SmtpClient<TcpDialer>,
}

impl BuiltinTransport {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            client: SmtpClient::new(config),
        }
    }
}

#[async_trait]
impl MailTransport for BuiltinTransport {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn send(&self, mail: &OutboundMail) -> Result<(), TransportError> {
        self.client.send(mail).await
    }
}

/// Caller-visible outcome. Immutable once constructed and serialized
/// verbatim as the response body.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

impl DispatchResult {
    pub fn delivered(message: impl Into<String>) -> Self {
        Self::stamped(true, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::stamped(false, message)
    }

    fn stamped(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// The result plus internal detail destined for the journal, never for
/// the caller.
pub struct DispatchOutcome {
    pub result: DispatchResult,
    pub detail: String,
}

pub struct MailDispatcher {
    config: DeliveryConfig,
    transport: Arc<dyn MailTransport>,
}

impl MailDispatcher {
    pub fn new(config: DeliveryConfig, kind: TransportKind) -> Result<Self, ConfigError> {
        let transport: Arc<dyn MailTransport> = match kind {
            TransportKind::Relay => Arc::new(RelayTransport::new(&config)?),
            TransportKind::Builtin => Arc::new(BuiltinTransport::new(&config)),
        };
        Ok(Self { config, transport })
    }

    /// Injection point for tests and embedders.
    pub fn with_transport(config: DeliveryConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    /// Builds the message and attempts delivery exactly once.
    pub async fn dispatch(&self, submission: &Submission, client_addr: IpAddr) -> DispatchOutcome {
        let envelope = Envelope::build(submission, Utc::now(), client_addr);
        let mail = OutboundMail {
            from_email: self.config.from_email.clone(),
            from_name: FROM_NAME.to_string(),
            to_email: TO_EMAIL.to_string(),
            reply_to: Some(envelope.reply_to),
            subject: envelope.subject,
            html_body: envelope.html_body,
        };

        match self.transport.send(&mail).await {
            Ok(()) => {
                tracing::info!(
                    transport = self.transport.name(),
                    page = %submission.page,
                    "contact submission delivered"
                );
                DispatchOutcome {
                    result: DispatchResult::delivered(SUCCESS_MESSAGE),
                    detail: submission.message.clone(),
                }
            }
            Err(err) => {
                tracing::error!(
                    transport = self.transport.name(),
                    error = %err,
                    "contact submission delivery failed"
                );
                DispatchOutcome {
                    result: DispatchResult::failed(delivery_failure_message()),
                    detail: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::RawSubmission;
    use std::sync::Mutex;

    pub(crate) struct StubTransport {
        pub sent: Mutex<Vec<OutboundMail>>,
        pub fail: bool,
    }

    impl StubTransport {
        pub(crate) fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl MailTransport for StubTransport {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn send(&self, mail: &OutboundMail) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(mail.clone());
            if self.fail {
                Err(TransportError::Relay("stubbed outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            host: "smtp.test".into(),
            port: 587,
            username: "user".into(),
            password: "secret".into(),
            from_email: "noreply@example.com".into(),
        }
    }

    fn submission() -> Submission {
        Submission::validate(RawSubmission {
            name: Some("Jo Lee".into()),
            email: Some("jo@example.com".into()),
            message: Some("Hello there, this is a test message.".into()),
            page: Some("About".into()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn successful_dispatch_builds_the_expected_message() {
        let stub = StubTransport::new(false);
        let dispatcher = MailDispatcher::with_transport(config(), stub.clone());
        let outcome = dispatcher
            .dispatch(&submission(), IpAddr::from([203, 0, 113, 7]))
            .await;

        assert!(outcome.result.success);
        assert_eq!(outcome.result.message, SUCCESS_MESSAGE);

        let sent = stub.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let mail = &sent[0];
        assert_eq!(mail.from_email, "noreply@example.com");
        assert_eq!(mail.to_email, TO_EMAIL);
        assert_eq!(mail.reply_to.as_deref(), Some("jo@example.com"));
        assert!(mail.subject.contains("About"));
        assert!(mail.html_body.contains("Jo Lee"));
        assert!(mail.html_body.contains("203.0.113.7"));
    }

    #[tokio::test]
    async fn failed_dispatch_reports_generic_message_with_fallback_address() {
        let stub = StubTransport::new(true);
        let dispatcher = MailDispatcher::with_transport(config(), stub.clone());
        let outcome = dispatcher
            .dispatch(&submission(), IpAddr::from([127, 0, 0, 1]))
            .await;

        assert!(!outcome.result.success);
        assert!(outcome.result.message.contains(TO_EMAIL));
        assert!(!outcome.result.message.contains("stubbed outage"));
        assert_eq!(outcome.detail, "relay transport: stubbed outage");
        // No retry: still a single attempt.
        assert_eq!(stub.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn result_shape_has_three_fields() {
        let result = DispatchResult::delivered("ok");
        let value = serde_json::to_value(&result).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("success"));
        assert!(object.contains_key("message"));
        assert!(object.contains_key("timestamp"));
    }
}
