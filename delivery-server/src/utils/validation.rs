//! Input validation helpers
//!
//! Text length limits and numeric checks shared by the order entry points.

use crate::utils::AppError;

/// Order notes, cancellation reasons, rejection reasons
pub const MAX_NOTE_LEN: usize = 500;

/// Promotion codes
pub const MAX_CODE_LEN: usize = 64;

/// Maximum quantity of one food per order line
pub const MAX_QUANTITY: i32 = 999;

/// Maximum number of lines per order
pub const MAX_ITEMS: usize = 100;

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate that a float is finite and within `[min, max]`.
pub fn validate_finite_range(value: f64, field: &str, min: f64, max: f64) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    if value < min || value > max {
        return Err(AppError::validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text() {
        assert!(validate_required_text("SALE20", "code", MAX_CODE_LEN).is_ok());
        assert!(validate_required_text("   ", "code", MAX_CODE_LEN).is_err());
        assert!(validate_required_text(&"x".repeat(65), "code", MAX_CODE_LEN).is_err());
    }

    #[test]
    fn optional_text() {
        assert!(validate_optional_text(&None, "note", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&Some("ring twice".into()), "note", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&Some("x".repeat(501)), "note", MAX_NOTE_LEN).is_err());
    }

    #[test]
    fn finite_range() {
        assert!(validate_finite_range(0.0, "discount", 0.0, 100.0).is_ok());
        assert!(validate_finite_range(100.0, "discount", 0.0, 100.0).is_ok());
        assert!(validate_finite_range(100.5, "discount", 0.0, 100.0).is_err());
        assert!(validate_finite_range(f64::NAN, "discount", 0.0, 100.0).is_err());
    }
}
