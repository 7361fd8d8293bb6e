//! Contact form submission parsing and validation.

use serde::Deserialize;

use crate::errors::ValidationError;
use crate::utils::{escape_html, is_valid_email};

const DEFAULT_PAGE: &str = "Website";
const PAGE_MAX_CHARS: usize = 100;

/// Untrusted request body as received from the form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub page: Option<String>,
}

/// A validated submission. The only way to construct one is
/// [`Submission::validate`], so every field reaching the dispatch layer
/// has been trimmed, escaped and length-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// HTML-escaped display name.
    pub name: String,
    /// Verbatim address; used as `Reply-To`, never embedded unescaped.
    pub email: String,
    /// HTML-escaped message text.
    pub message: String,
    /// HTML-escaped page label, `"Website"` when absent. Single line:
    /// the label feeds the Subject header, so line breaks are collapsed
    /// and the length is bounded before it can reach the wire.
    pub page: String,
}

impl Submission {
    /// Pure validation of the raw fields. No I/O.
    ///
    /// Lengths are measured after trimming and escaping, so an
    /// ampersand-heavy message can trip the upper bound earlier than
    /// its raw character count suggests.
    pub fn validate(raw: RawSubmission) -> Result<Self, ValidationError> {
        let (Some(name), Some(email), Some(message)) = (raw.name, raw.email, raw.message) else {
            return Err(ValidationError::MissingField);
        };

        let name = escape_html(name.trim());
        let message = escape_html(message.trim());
        let page = match raw.page {
            Some(page) => {
                let page = page.replace(['\r', '\n'], " ");
                let page = page.trim();
                if page.is_empty() {
                    DEFAULT_PAGE.to_string()
                } else {
                    escape_html(&page.chars().take(PAGE_MAX_CHARS).collect::<String>())
                }
            }
            None => DEFAULT_PAGE.to_string(),
        };

        let email = email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(ValidationError::InvalidEmail);
        }

        if name.len() < 2 || name.len() > 100 {
            return Err(ValidationError::NameLength);
        }
        if message.len() < 10 || message.len() > 1000 {
            return Err(ValidationError::MessageLength);
        }

        Ok(Self {
            name,
            email,
            message,
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(name: &str, email: &str, message: &str) -> RawSubmission {
        RawSubmission {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            message: Some(message.to_string()),
            page: None,
        }
    }

    #[test]
    fn valid_submission_passes() {
        let s = Submission::validate(raw(
            "Jo Lee",
            "jo@example.com",
            "Hello there, this is a test message.",
        ))
        .unwrap();
        assert_eq!(s.name, "Jo Lee");
        assert_eq!(s.email, "jo@example.com");
        assert_eq!(s.page, "Website");
    }

    #[test]
    fn missing_fields_rejected() {
        let err = Submission::validate(RawSubmission {
            name: Some("Jo".into()),
            email: None,
            message: Some("long enough message".into()),
            page: None,
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField);
    }

    #[test]
    fn fields_are_trimmed_and_escaped() {
        let s = Submission::validate(raw(
            "  <Jo> ",
            "jo@example.com",
            "  Tom & Jerry say \"hi\"  ",
        ))
        .unwrap();
        assert_eq!(s.name, "&lt;Jo&gt;");
        assert_eq!(s.message, "Tom &amp; Jerry say &quot;hi&quot;");
    }

    #[test]
    fn page_defaults_and_escapes() {
        let mut r = raw("Jo Lee", "jo@example.com", "a perfectly fine message");
        r.page = Some(" About <us> ".into());
        let s = Submission::validate(r).unwrap();
        assert_eq!(s.page, "About &lt;us&gt;");

        let mut r = raw("Jo Lee", "jo@example.com", "a perfectly fine message");
        r.page = Some("   ".into());
        assert_eq!(Submission::validate(r).unwrap().page, "Website");
    }

    #[test]
    fn page_line_breaks_are_collapsed() {
        let mut r = raw("Jo Lee", "jo@example.com", "a perfectly fine message");
        r.page = Some("About\r\nBcc: attacker@evil.example".into());
        let s = Submission::validate(r).unwrap();
        assert!(!s.page.contains('\r'));
        assert!(!s.page.contains('\n'));
        assert_eq!(s.page, "About  Bcc: attacker@evil.example");
    }

    #[test]
    fn page_length_is_bounded() {
        let mut r = raw("Jo Lee", "jo@example.com", "a perfectly fine message");
        r.page = Some("p".repeat(500));
        let s = Submission::validate(r).unwrap();
        assert_eq!(s.page.chars().count(), 100);
    }

    #[test]
    fn invalid_emails_rejected() {
        for email in ["not-an-email", "", "a@b", "jo@"] {
            let err =
                Submission::validate(raw("Jo Lee", email, "a perfectly fine message")).unwrap_err();
            assert_eq!(err, ValidationError::InvalidEmail, "email: {email:?}");
        }
    }

    #[test]
    fn name_length_bounds() {
        let err = Submission::validate(raw("J", "jo@example.com", "a perfectly fine message"))
            .unwrap_err();
        assert_eq!(err, ValidationError::NameLength);

        let long = "x".repeat(101);
        let err = Submission::validate(raw(&long, "jo@example.com", "a perfectly fine message"))
            .unwrap_err();
        assert_eq!(err, ValidationError::NameLength);

        assert!(Submission::validate(raw("Jo", "jo@example.com", "a perfectly fine message")).is_ok());
        let max = "x".repeat(100);
        assert!(Submission::validate(raw(&max, "jo@example.com", "a perfectly fine message")).is_ok());
    }

    #[test]
    fn message_length_bounds() {
        let err = Submission::validate(raw("Jo Lee", "jo@example.com", "too short")).unwrap_err();
        assert_eq!(err, ValidationError::MessageLength);

        let long = "x".repeat(1001);
        let err = Submission::validate(raw("Jo Lee", "jo@example.com", &long)).unwrap_err();
        assert_eq!(err, ValidationError::MessageLength);

        let max = "x".repeat(1000);
        assert!(Submission::validate(raw("Jo Lee", "jo@example.com", &max)).is_ok());
    }

    #[test]
    fn length_is_measured_after_escaping() {
        // 34 raw characters, but each '&' escapes to five.
        let raw_message = "&&&&&&&&&&&&&&&&&&&&&&&&&&&&&&&&&&";
        let escaped_len = raw_message.len() * 5;
        assert!(escaped_len < 1000);
        assert!(
            Submission::validate(raw("Jo Lee", "jo@example.com", raw_message)).is_ok()
        );

        let raw_message = "&".repeat(201);
        let err = Submission::validate(raw("Jo Lee", "jo@example.com", &raw_message)).unwrap_err();
        assert_eq!(err, ValidationError::MessageLength);
    }
}
