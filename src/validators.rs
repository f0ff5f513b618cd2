/// Input validators
///
/// Boundary validation for the fields the handlers accept. Email
/// addresses are normalized here (trimmed, lowercased) so the rest of
/// the crate only ever sees the canonical form.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validates and normalizes an email address.
///
/// Returns the canonical form: trimmed and lowercased. Lookups and
/// the unique column both rely on this normalization.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalized.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort(
            "email".to_string(),
            MIN_EMAIL_LENGTH,
        ));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong(
            "email".to_string(),
            MAX_EMAIL_LENGTH,
        ));
    }

    if !EMAIL_REGEX.is_match(&normalized) || normalized.matches('@').count() != 1 {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }

    // Local part longer than 64 octets is invalid per RFC 5321
    if let Some(at_pos) = normalized.find('@') {
        if normalized[..at_pos].len() > 64 {
            return Err(ValidationError::InvalidFormat(
                "email has invalid format".to_string(),
            ));
        }
    }

    Ok(normalized)
}

/// Validates an optional profile name (first or last).
///
/// Returns the trimmed name, or None for absent/blank input.
pub fn normalize_name(
    field: &str,
    name: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    let trimmed = match name {
        Some(value) => value.trim(),
        None => return Ok(None),
    };

    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(
            field.to_string(),
            MAX_NAME_LENGTH,
        ));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(format!(
            "{} contains invalid characters",
            field
        )));
    }

    Ok(Some(trimmed.to_string()))
}
