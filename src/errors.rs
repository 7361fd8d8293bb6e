//! Error taxonomy for the dispatch subsystem.

use thiserror::Error;

/// Delivery settings are missing or unusable. Fatal to the request;
/// nothing is attempted on a partial configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),
    #[error("SMTP_PORT is not a valid port number: {0:?}")]
    InvalidPort(String),
    #[error("BIND_ADDR is not a valid socket address: {0:?}")]
    InvalidBindAddr(String),
    #[error("CONTACT_ALLOW_ORIGIN is not a valid header value: {0:?}")]
    InvalidOrigin(String),
    #[error("SMTP_TRANSPORT must be \"relay\" or \"builtin\", got {0:?}")]
    InvalidTransport(String),
    #[error("failed to initialize SMTP relay transport: {0}")]
    RelaySetup(String),
}

/// A submission field is missing, malformed, or out of bounds.
/// Always recoverable; reported to the caller without any network I/O.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingField,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Name must be between 2 and 100 characters")]
    NameLength,
    #[error("Message must be between 10 and 1000 characters")]
    MessageLength,
}

/// Identifies where in the SMTP exchange a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpStep {
    Connect,
    Greeting,
    Ehlo,
    StartTls,
    TlsHandshake,
    SecureGreeting,
    EhloSecure,
    AuthLogin,
    AuthUsername,
    AuthPassword,
    MailFrom,
    RcptTo,
    Data,
    Body,
    Quit,
}

impl std::fmt::Display for SmtpStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SmtpStep::Connect => "connect",
            SmtpStep::Greeting => "greeting",
            SmtpStep::Ehlo => "EHLO",
            SmtpStep::StartTls => "STARTTLS",
            SmtpStep::TlsHandshake => "TLS handshake",
            SmtpStep::SecureGreeting => "greeting after TLS",
            SmtpStep::EhloSecure => "EHLO after TLS",
            SmtpStep::AuthLogin => "AUTH LOGIN",
            SmtpStep::AuthUsername => "AUTH LOGIN username",
            SmtpStep::AuthPassword => "AUTH LOGIN password",
            SmtpStep::MailFrom => "MAIL FROM",
            SmtpStep::RcptTo => "RCPT TO",
            SmtpStep::Data => "DATA",
            SmtpStep::Body => "message body",
            SmtpStep::Quit => "QUIT",
        };
        f.write_str(name)
    }
}

/// Socket, TLS, or protocol failure inside a transport. Aborts the
/// current attempt; the connection is closed and nothing is retried.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{step} failed: {source}")]
    Io {
        step: SmtpStep,
        source: std::io::Error,
    },
    #[error("{step} timed out")]
    Timeout { step: SmtpStep },
    #[error("connection closed by server during {step}")]
    Closed { step: SmtpStep },
    #[error("{step} rejected by server: {reply}")]
    Rejected { step: SmtpStep, reply: String },
    #[error("relay transport: {0}")]
    Relay(String),
}

impl TransportError {
    pub fn io(step: SmtpStep, source: std::io::Error) -> Self {
        TransportError::Io { step, source }
    }
}
