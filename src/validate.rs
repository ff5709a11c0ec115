//! Form validation that runs before any backend call.

use chrono::NaiveDateTime;
use url::Url;

use crate::dates;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    InvalidUrl(String),
    InvalidExpiration(String),
    ExpirationInPast,
}

impl ValidationError {
    /// Message shown above the form.
    pub fn message(&self) -> &'static str {
        match self {
            ValidationError::InvalidUrl(_) => "La URL ingresada no es válida.",
            ValidationError::InvalidExpiration(_) => "La fecha de expiración no es válida.",
            ValidationError::ExpirationInPast => "La fecha de expiración debe ser futura.",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidUrl(reason) => write!(f, "invalid url: {}", reason),
            ValidationError::InvalidExpiration(value) => write!(f, "invalid expiration: {}", value),
            ValidationError::ExpirationInPast => write!(f, "expiration must be in the future"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Accepts absolute http(s) URLs with a host and returns the normalized form,
/// percent-encoded so it can always travel in a `Location` header.
pub fn validate_target_url(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidUrl("empty".to_string()));
    }
    let parsed = Url::parse(trimmed).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::InvalidUrl(format!("unsupported scheme {}", other))),
    }
    if parsed.host().is_none() {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }
    Ok(parsed.into())
}

pub fn parse_expiration(input: &str) -> Result<Option<NaiveDateTime>, ValidationError> {
    dates::parse_input_value(input).map_err(|_| ValidationError::InvalidExpiration(input.trim().to_string()))
}

/// An expiration, when present, must be strictly after `now`.
pub fn validate_expiration(expires_at: Option<NaiveDateTime>, now: NaiveDateTime) -> Result<(), ValidationError> {
    match expires_at {
        Some(expires_at) if expires_at <= now => Err(ValidationError::ExpirationInPast),
        _ => Ok(()),
    }
}
