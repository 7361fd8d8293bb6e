//! Message construction: subject line and HTML body for one submission.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::submission::Submission;

/// Per-request message content derived from a validated submission.
/// All interpolated user data was escaped by the validator; the only
/// verbatim field is the address, which appears in a text node and as
/// `Reply-To`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub subject: String,
    pub html_body: String,
    /// The visitor's address, carried as `Reply-To` so replies reach
    /// them while the envelope sender stays the system address.
    pub reply_to: String,
}

impl Envelope {
    pub fn build(submission: &Submission, submitted_at: DateTime<Utc>, client_addr: IpAddr) -> Self {
        let subject = format!("New contact form submission - {}", submission.page);
        let html_body = render_body(submission, submitted_at, client_addr);
        Self {
            subject,
            html_body,
            reply_to: submission.email.clone(),
        }
    }
}

fn render_body(submission: &Submission, submitted_at: DateTime<Utc>, client_addr: IpAddr) -> String {
    let message_html = break_lines(&submission.message);
    let submitted = submitted_at.format("%Y-%m-%d %H:%M:%S UTC");
    format!(
        "<html>\n\
         <head>\n\
         <title>New Contact Form Submission</title>\n\
         <style>\n\
         body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}\n\
         .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}\n\
         .header {{ background-color: #4a6fa5; color: white; padding: 20px; text-align: center; }}\n\
         .field {{ margin-bottom: 15px; }}\n\
         .label {{ font-weight: bold; }}\n\
         .value {{ margin-top: 5px; padding: 10px; background-color: #f9f9f9; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <div class='container'>\n\
         <div class='header'>\n\
         <h2>New Contact Form Submission</h2>\n\
         <p>{page} Page</p>\n\
         </div>\n\
         <div class='field'><div class='label'>Name:</div><div class='value'>{name}</div></div>\n\
         <div class='field'><div class='label'>Email:</div><div class='value'>{email}</div></div>\n\
         <div class='field'><div class='label'>Message:</div><div class='value'>{message}</div></div>\n\
         <div class='field'><div class='label'>Submitted:</div><div class='value'>{submitted}</div></div>\n\
         <div class='field'><div class='label'>IP Address:</div><div class='value'>{client_addr}</div></div>\n\
         <div class='footer'><p>This email was sent automatically from the website contact form.</p></div>\n\
         </div>\n\
         </body>\n\
         </html>\n",
        page = submission.page,
        name = submission.name,
        email = submission.email,
        message = message_html,
    )
}

/// Turns embedded newlines into `<br>` so multi-line messages render.
fn break_lines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "<br>\n")
}
