//! Delivery and server configuration, resolved from process environment.
//!
//! Resolution happens once at startup. A partial delivery configuration
//! is never acted upon: if any mandatory value is absent the resolver
//! returns an error naming the variables (never their values) and the
//! server refuses every submission until it is restarted with a
//! complete environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Display name used in the `From` header and the message template.
pub const FROM_NAME: &str = "Website Contact Form";

/// Fixed recipient for every contact submission, also quoted to the
/// visitor as the fallback address when delivery fails.
pub const TO_EMAIL: &str = "info@example.org";

const DEFAULT_HOST: &str = "mail.smtp2go.com";
const DEFAULT_PORT: u16 = 587;

/// Settings required to attempt any send. Immutable for the process
/// lifetime; passed by reference into the dispatcher.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

impl DeliveryConfig {
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`
    /// and `SMTP_FROM_EMAIL`. Only host and port have defaults; the
    /// credentials and sender address are mandatory.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("SMTP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port_raw = get("SMTP_PORT");
        let username = get("SMTP_USERNAME");
        let password = get("SMTP_PASSWORD");
        let from_email = get("SMTP_FROM_EMAIL");

        let mut missing = Vec::new();
        if username.is_none() {
            missing.push("SMTP_USERNAME");
        }
        if password.is_none() {
            missing.push("SMTP_PASSWORD");
        }
        if from_email.is_none() {
            missing.push("SMTP_FROM_EMAIL");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let port = match port_raw {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        // Checked above, missing is empty.
        Ok(Self {
            host,
            port,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
            from_email: from_email.unwrap_or_default(),
        })
    }
}

/// Which transport the dispatcher uses, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The lettre SMTP client (default).
    Relay,
    /// The hand-written protocol client.
    Builtin,
}

/// Server-level settings that apply regardless of whether delivery is
/// configured.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub transport: TransportKind,
    pub journal_path: PathBuf,
    /// When false (the default), the journal records outcomes without
    /// the visitor's name or address.
    pub log_personal_data: bool,
    /// `None` means wildcard.
    pub allow_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidBindAddr(raw))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let transport = match get("SMTP_TRANSPORT").as_deref() {
            None | Some("relay") => TransportKind::Relay,
            Some("builtin") => TransportKind::Builtin,
            Some(other) => return Err(ConfigError::InvalidTransport(other.to_string())),
        };

        let journal_path = get("CONTACT_JOURNAL")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("contact_submissions.log"));

        let log_personal_data = matches!(
            get("CONTACT_LOG_PERSONAL_DATA").as_deref(),
            Some("true") | Some("1") | Some("yes")
        );

        let allow_origin = get("CONTACT_ALLOW_ORIGIN").filter(|v| v != "*");

        Ok(Self {
            bind_addr,
            transport,
            journal_path,
            log_personal_data,
            allow_origin,
        })
    }
}
