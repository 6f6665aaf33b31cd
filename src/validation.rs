//! Input checks shared by the create/edit handlers.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ApiError;
use crate::models::board::BoardStatus;

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_TITLE_LEN: usize = 200;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Lower-cased, trimmed e-mail, or a 400.
pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email_regex().is_match(&email) {
        Ok(email)
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}

pub fn password(raw: &str) -> Result<(), ApiError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Trimmed non-empty text for names and titles.
pub fn required_text(field: &str, raw: &str) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request(format!(
            "{} must be at most {} characters",
            field, MAX_TITLE_LEN
        )));
    }
    Ok(value.to_string())
}

/// Blank optional text collapses to `None`.
pub fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn custom_statuses(statuses: &[BoardStatus]) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for status in statuses {
        if status.id.trim().is_empty() {
            return Err(ApiError::bad_request("Status id is required"));
        }
        if status.name.trim().is_empty() {
            return Err(ApiError::bad_request("Status name is required"));
        }
        if !seen.insert(status.id.as_str()) {
            return Err(ApiError::bad_request(format!("Duplicate status id: {}", status.id)));
        }
    }
    Ok(())
}
