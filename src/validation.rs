use std::net::IpAddr;

use crate::error::{Result, TrackerError};

/// Longest identifier kept from a pixel URL.
pub const MAX_IDENTIFIER_CHARS: usize = 256;
/// Longest user agent kept from a request.
pub const MAX_USER_AGENT_CHARS: usize = 512;
/// Longest value kept for a single contact form field.
pub const MAX_FIELD_CHARS: usize = 512;
/// Longest forwarded-for entry kept as an origin address.
pub const MAX_ADDRESS_CHARS: usize = 64;

/// Input sanitization for attacker-controllable request data.
///
/// Nothing here rejects a request: tracking and contact intake must always
/// succeed, so values are cleaned and clamped instead.
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Clean a pixel identifier: no control characters, no surrounding
    /// whitespace, bounded length.
    #[must_use]
    pub fn sanitize_identifier(identifier: &str) -> String {
        let cleaned: String = identifier.chars().filter(|c| !c.is_control()).collect();
        truncate_chars(cleaned.trim(), MAX_IDENTIFIER_CHARS)
    }

    /// Clean a single-line header value.
    #[must_use]
    pub fn sanitize_header(value: &str) -> String {
        let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
        truncate_chars(cleaned.trim(), MAX_ADDRESS_CHARS)
    }

    /// Clean a `User-Agent` value.
    #[must_use]
    pub fn sanitize_user_agent(value: &str) -> String {
        let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
        truncate_chars(cleaned.trim(), MAX_USER_AGENT_CHARS)
    }

    /// Clean a contact form field; blank values become `None`.
    #[must_use]
    pub fn sanitize_field(value: &str) -> Option<String> {
        let cleaned = Self::sanitize_text(value);
        if cleaned.is_empty() {
            None
        } else {
            Some(truncate_chars(&cleaned, MAX_FIELD_CHARS))
        }
    }

    /// Resolve the client address for an open-event.
    ///
    /// The first non-empty entry of `X-Forwarded-For` wins (the original
    /// client when behind a proxy); otherwise the peer address; otherwise "".
    #[must_use]
    pub fn resolve_client_address(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> String {
        let forwarded = forwarded_for.and_then(|header| {
            header
                .split(',')
                .map(str::trim)
                .find(|entry| !entry.is_empty())
        });

        match (forwarded, peer) {
            (Some(entry), _) => Self::sanitize_header(entry),
            (None, Some(ip)) => ip.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Loose plausibility check for an email address.
    ///
    /// Used to decide whether a submitted address can be offered as the
    /// notification's reply-to; never used to reject a submission.
    #[must_use]
    pub fn is_plausible_email(email: &str) -> bool {
        if email.len() > 254 {
            return false;
        }

        let Some((local_part, domain_part)) = email.split_once('@') else {
            return false;
        };

        !local_part.is_empty()
            && local_part.len() <= 64
            && !domain_part.contains('@')
            && domain_part.contains('.')
            && !domain_part.starts_with('.')
            && !domain_part.ends_with('.')
            && !email.chars().any(char::is_whitespace)
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(TrackerError::Config("Database URL cannot be empty".to_string()));
        }

        let supported = ["postgres://", "postgresql://", "sqlite:"];
        if !supported.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(TrackerError::Config(format!(
                "Unsupported database URL scheme. Must start with one of: {supported:?}"
            )));
        }

        if url.len() > 1000 {
            return Err(TrackerError::Config("Database URL too long".to_string()));
        }

        Ok(())
    }
}

/// Keep at most `max_chars` characters, never splitting a code point.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
