//! Input validation.
//!
//! Each check returns `Ok(())` or a [`MarketError::Validation`] naming the
//! offending field, so handlers can chain them with `?`.

use crate::error::{MarketError, Result};
use crate::model::Content;
use crate::types::{ContentKind, UserId};

/// Longest display name.
pub const MAX_NAME_LEN: usize = 100;
/// Longest content title.
pub const MAX_TITLE_LEN: usize = 200;
/// Longest content description.
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
/// Longest profile bio.
pub const MAX_BIO_LEN: usize = 2_000;
/// Longest review or comment body.
pub const MAX_BODY_LEN: usize = 5_000;
/// Fewest options a quiz question may have.
pub const MIN_OPTIONS: usize = 2;
/// Most options a quiz question may have.
pub const MAX_OPTIONS: usize = 8;

/// Normalize an email address for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format validation.
///
/// # Examples
///
/// ```
/// use edumarket_core::validation::is_valid_email;
///
/// assert!(is_valid_email("ada@example.com"));
/// assert!(is_valid_email("ada+tag@mail.example.org"));
/// assert!(!is_valid_email("ada@localhost"));
/// assert!(!is_valid_email("@example.com"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 255 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    let domain_ok = domain.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'));
    local_ok && domain_ok && domain.contains('.') && domain.split('.').all(|part| !part.is_empty())
}

/// Validate an email address.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for malformed addresses.
pub fn email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(MarketError::validation("email is not a valid address"))
    }
}

/// Require `value` to be non-blank and at most `max` characters.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] naming `field`.
pub fn text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MarketError::validation(format!("{field} must not be empty")));
    }
    optional_text(field, value, max)
}

/// Allow an empty `value` but cap its length.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] naming `field`.
pub fn optional_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(MarketError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Validate a display name.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for blank or overlong names.
pub fn name(value: &str) -> Result<()> {
    text("name", value, MAX_NAME_LEN)
}

/// Validate a content title.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for blank or overlong titles.
pub fn title(value: &str) -> Result<()> {
    text("title", value, MAX_TITLE_LEN)
}

/// Validate a star rating.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] outside `1..=5`.
pub fn rating(value: u8) -> Result<()> {
    if (1..=5).contains(&value) {
        Ok(())
    } else {
        Err(MarketError::validation("rating must be between 1 and 5"))
    }
}

/// Validate a review or comment body.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for blank or overlong bodies.
pub fn body(value: &str) -> Result<()> {
    text("body", value, MAX_BODY_LEN)
}

/// Validate the options of a quiz question.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] unless there are
/// `MIN_OPTIONS..=MAX_OPTIONS` non-blank options and `correct_index`
/// points at one of them.
pub fn question(prompt: &str, options: &[String], correct_index: u32) -> Result<()> {
    text("prompt", prompt, MAX_DESCRIPTION_LEN)?;
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(MarketError::validation(format!(
            "a question needs between {MIN_OPTIONS} and {MAX_OPTIONS} options"
        )));
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(MarketError::validation("options must not be empty"));
    }
    if usize::try_from(correct_index).map_or(true, |i| i >= options.len()) {
        return Err(MarketError::validation("correct_index is out of range"));
    }
    Ok(())
}

/// Check that `kind` may be placed under `parent` by `teacher_id`.
///
/// Only lectures and quizzes may be nested, and only inside a course
/// published by the same teacher.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] when the hierarchy is not allowed.
pub fn hierarchy(kind: ContentKind, teacher_id: UserId, parent: Option<&Content>) -> Result<()> {
    let Some(parent) = parent else {
        return Ok(());
    };
    if !kind.can_have_parent() {
        return Err(MarketError::validation(format!("a {kind} cannot belong to a course")));
    }
    if parent.kind != ContentKind::Course {
        return Err(MarketError::validation("parent must be a course"));
    }
    if parent.teacher_id != teacher_id {
        return Err(MarketError::validation("parent course belongs to another teacher"));
    }
    Ok(())
}
