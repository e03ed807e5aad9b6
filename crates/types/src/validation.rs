//! Input validation for review submissions.
//!
//! All checks run before any transaction opens; a rejected input causes no
//! partial state change. Used at the engine's public API boundary.
//!
//! ## Rules
//!
//! - Sub-scores: in [0,5] at 0.5 granularity.
//! - Screen tags: `[a-z0-9-]{1,63}`, safe for storage keys and log output.
//! - External ids: non-empty, at most 256 UTF-8 bytes.

use std::fmt;

use crate::review::ScoreCard;

/// Maximum UTF-8 byte length of an external identifier.
pub const MAX_ID_BYTES: usize = 256;

/// Maximum UTF-8 byte length of a screen tag.
pub const MAX_TAG_BYTES: usize = 63;

/// Half-step granularity tolerance. Scores arrive as binary floats; anything
/// farther than this from a half-step was not produced by a 0.5-step picker.
const STEP_EPSILON: f64 = 1e-9;

/// Validation error with structured context.
///
/// Contains the specific constraint that was violated and the field name.
/// The display form is suitable for showing to the submitting user directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl ValidationError {
    fn new(field: &str, constraint: impl Into<String>) -> Self {
        Self { field: field.to_owned(), constraint: constraint.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a single sub-score: finite, in [0,5], at a 0.5 step.
///
/// # Errors
///
/// Returns [`ValidationError`] naming the offending field if the score is
/// out of range or off-step.
pub fn validate_score(field: &str, score: f64) -> Result<(), ValidationError> {
    if !score.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number"));
    }
    if !(0.0..=5.0).contains(&score) {
        return Err(ValidationError::new(
            field,
            format!("value {score} outside allowed range [0, 5]"),
        ));
    }
    let doubled = score * 2.0;
    if (doubled - doubled.round()).abs() > STEP_EPSILON {
        return Err(ValidationError::new(
            field,
            format!("value {score} is not a multiple of 0.5"),
        ));
    }
    Ok(())
}

/// Validates all four sub-scores of a score card.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, in field order
/// (screen, picture, sound, seat).
pub fn validate_scores(scores: &ScoreCard) -> Result<(), ValidationError> {
    validate_score("screen", scores.screen)?;
    validate_score("picture", scores.picture)?;
    validate_score("sound", scores.sound)?;
    validate_score("seat", scores.seat)?;
    Ok(())
}

/// Validates a screen tag against length limits and the `[a-z0-9-]` whitelist.
///
/// # Errors
///
/// Returns [`ValidationError`] if the tag is empty, too long, or contains
/// characters outside the whitelist.
pub fn validate_tag(tag: &str) -> Result<(), ValidationError> {
    if tag.is_empty() {
        return Err(ValidationError::new("tag", "a screen tag must be selected"));
    }
    if tag.len() > MAX_TAG_BYTES {
        return Err(ValidationError::new(
            "tag",
            format!("length {} bytes exceeds maximum {MAX_TAG_BYTES} bytes", tag.len()),
        ));
    }
    if let Some(pos) = tag.find(|c: char| !is_tag_char(c)) {
        return Err(ValidationError::new(
            "tag",
            format!(
                "contains invalid character {:?} at byte offset {pos}; allowed: [a-z0-9-]",
                tag[pos..].chars().next().unwrap_or('\0'),
            ),
        ));
    }
    Ok(())
}

/// Validates an external identifier (cinema, author, viewer): non-empty and
/// within the key-encoding length bound.
///
/// # Errors
///
/// Returns [`ValidationError`] if the id is empty or exceeds [`MAX_ID_BYTES`].
pub fn validate_id(field: &str, id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if id.len() > MAX_ID_BYTES {
        return Err(ValidationError::new(
            field,
            format!("length {} bytes exceeds maximum {MAX_ID_BYTES} bytes", id.len()),
        ));
    }
    Ok(())
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_accepts_half_steps() {
        for step in 0..=10 {
            let score = f64::from(step) * 0.5;
            validate_score("screen", score).expect("half step should validate");
        }
    }

    #[test]
    fn test_score_rejects_out_of_range() {
        assert!(validate_score("screen", -0.5).is_err());
        assert!(validate_score("screen", 5.5).is_err());
        assert!(validate_score("screen", f64::NAN).is_err());
    }

    #[test]
    fn test_score_rejects_off_step() {
        let err = validate_score("sound", 3.7).expect_err("should reject");
        assert_eq!(err.field, "sound");
        assert!(err.constraint.contains("0.5"));
    }

    #[test]
    fn test_scores_reports_first_bad_field() {
        let scores = ScoreCard::new(5.0, 6.0, 7.0, 0.0);
        let err = validate_scores(&scores).expect_err("should reject");
        assert_eq!(err.field, "picture");
    }

    #[test]
    fn test_tag_whitelist() {
        validate_tag("imax").expect("should validate");
        validate_tag("dolby-atmos").expect("should validate");
        assert!(validate_tag("").is_err());
        assert!(validate_tag("IMAX").is_err());
        assert!(validate_tag("4dx!").is_err());
    }

    #[test]
    fn test_id_bounds() {
        validate_id("author", "u1").expect("should validate");
        assert!(validate_id("author", "").is_err());
        assert!(validate_id("author", &"x".repeat(MAX_ID_BYTES + 1)).is_err());
    }
}
