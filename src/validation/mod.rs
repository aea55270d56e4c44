//! Pre-flight payload validation.
//!
//! Validation never mutates its input and collects every violation before
//! failing, so a single error lists everything wrong with a payload.
//!
//! Address checks are deliberately stricter than RFC 5322: no spaces,
//! exactly one `@`, and a dotted domain without empty labels.

use crate::errors::{PostalError, PostalResult};
use crate::types::{Attachment, Message, RawMessage};

/// Validates a message before sending.
///
/// # Errors
///
/// Returns [`PostalError::Validation`] listing every violation found.
pub fn validate_message(msg: &Message) -> PostalResult<()> {
    let mut violations = Vec::new();

    check_envelope(&msg.to, &msg.from, &mut violations);

    if msg.subject.is_empty() {
        violations.push("subject is required".to_string());
    }

    if is_blank(msg.plain_body.as_deref()) && is_blank(msg.html_body.as_deref()) {
        violations.push("either plain body or HTML body is required".to_string());
    }

    check_addresses(msg.recipients(), &msg.from, &mut violations);

    for attachment in &msg.attachments {
        check_attachment(attachment, &mut violations);
    }

    finish(violations)
}

/// Validates a raw message before sending.
///
/// # Errors
///
/// Returns [`PostalError::Validation`] listing every violation found.
pub fn validate_raw_message(raw: &RawMessage) -> PostalResult<()> {
    let mut violations = Vec::new();

    check_envelope(&raw.to, &raw.from, &mut violations);

    if raw.mail.is_empty() {
        violations.push("raw mail content is required".to_string());
    }

    check_addresses(raw.to.iter().map(String::as_str), &raw.from, &mut violations);

    finish(violations)
}

/// Performs basic email address format validation.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.contains(' ') {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    !domain.contains("..") && domain.split('.').all(|label| !label.is_empty())
}

fn check_envelope(to: &[String], from: &str, violations: &mut Vec<String>) {
    if to.is_empty() {
        violations.push("recipient (To) is required".to_string());
    }

    if from.is_empty() {
        violations.push("sender (From) is required".to_string());
    }
}

fn check_addresses<'a>(
    recipients: impl Iterator<Item = &'a str>,
    from: &str,
    violations: &mut Vec<String>,
) {
    for recipient in recipients {
        if !is_valid_email(recipient) {
            violations.push(format!("invalid recipient email: {}", recipient));
        }
    }

    if !is_valid_email(from) {
        violations.push(format!("invalid sender email: {}", from));
    }
}

fn check_attachment(attachment: &Attachment, violations: &mut Vec<String>) {
    if attachment.name.is_empty() {
        violations.push("attachment name is required".to_string());
    }
    if attachment.content_type.is_empty() {
        violations.push("attachment content type is required".to_string());
    }
    if attachment.data.is_empty() {
        violations.push("attachment data is required".to_string());
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

fn finish(violations: Vec<String>) -> PostalResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(PostalError::validation(violations))
    }
}
