//! contact-mailer: contact form backend with SMTP delivery.
//!
//! Validates untrusted form submissions, resolves delivery settings
//! from the environment, and sends one email per accepted request
//! through either the lettre relay transport or a hand-written SMTP
//! protocol client (STARTTLS + AUTH LOGIN).

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod journal;
pub mod response;
pub mod server;
pub mod smtp;
pub mod submission;
pub mod utils;

// Re-exports
pub use config::{AppConfig, DeliveryConfig, TransportKind, FROM_NAME, TO_EMAIL};
pub use dispatch::{
    DispatchOutcome, DispatchResult, MailDispatcher, MailTransport, OutboundMail,
};
pub use envelope::Envelope;
pub use errors::{ConfigError, SmtpStep, TransportError, ValidationError};
pub use journal::{Attempt, Journal};
pub use response::ResponseEnvelope;
pub use server::AppState;
pub use smtp::{Dialer, SmtpClient, TcpDialer};
pub use submission::{RawSubmission, Submission};
pub use utils::{escape_html, is_valid_email};
