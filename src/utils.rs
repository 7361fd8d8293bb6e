//! Email address validation and HTML sanitization.

use regex::Regex;
use std::sync::OnceLock;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap()
    })
}

/// Validates email format (RFC 5322 simplified).
///
/// The domain must contain a dot and end in a TLD of at least two
/// characters; the address is used verbatim as an envelope field, so
/// anything this accepts must be safe to place in `RCPT TO`/`Reply-To`.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() {
        return false;
    }
    if !email_re().is_match(email) {
        return false;
    }
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let local = parts[0];
    let domain = parts[1];
    if local.len() > 64 {
        return false;
    }
    if domain.len() > 255 {
        return false;
    }
    if !domain.contains('.') {
        return false;
    }
    let tld = domain.split('.').next_back().unwrap_or("");
    tld.len() >= 2
}

/// Escapes the five HTML-significant characters so user text can be
/// embedded in the message body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
