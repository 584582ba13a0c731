//! Request Validation
//!
//! Checks applied at the HTTP boundary before the store is touched.

use std::sync::OnceLock;
use regex::Regex;
use serde_json::{Map, Value};

use us_common::{NewUser, ProfileUpdate};

use crate::error::{PlatformError, Result};

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 100;

pub const NAME_REQUIRED: &str = "Name is required";
pub const NAME_LENGTH: &str = "Name must be between 2 and 100 characters";
pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Email should be valid";

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // One '@', a non-empty local part, and a dotted domain without spaces
        let pattern = r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)*$";
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

fn name_violation(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        return Some(NAME_REQUIRED);
    }
    let length = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&length) {
        return Some(NAME_LENGTH);
    }
    None
}

fn email_violation(email: &str) -> Option<&'static str> {
    if email.trim().is_empty() {
        return Some(EMAIL_REQUIRED);
    }
    if !email_regex().is_match(email) {
        return Some(EMAIL_INVALID);
    }
    None
}

/// Validate a create or full-update body.
///
/// All violations are reported together, separated by "; ".
pub fn validate_new_user(candidate: &NewUser) -> Result<()> {
    let violations: Vec<&str> = [name_violation(&candidate.name), email_violation(&candidate.email)]
        .into_iter()
        .flatten()
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(PlatformError::validation(violations.join("; ")))
    }
}

/// Validate a partial profile map and convert it to a typed update.
///
/// Keys other than `name` and `phoneNumber` are accepted and ignored.
pub fn validate_profile_updates(updates: &Map<String, Value>) -> Result<ProfileUpdate> {
    let update = ProfileUpdate::from_map(updates)
        .map_err(|e| PlatformError::validation(e.to_string()))?;

    if let Some(name) = &update.name {
        if let Some(violation) = name_violation(name) {
            return Err(PlatformError::validation(violation));
        }
    }

    Ok(update)
}
