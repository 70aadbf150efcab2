//! Input validation primitives shared by all request payloads.

use chrono::NaiveDate;

/// First failing field of an input payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Implemented by every request payload that reaches the service layer.
pub trait Validate {
    /// Returns the first failing field, in declaration order.
    fn validate(&self) -> ValidationResult;
}

pub const MAX_NAME_LEN: usize = 100;

pub fn require_name(field: &str, value: &str) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

pub fn optional_name(field: &str, value: Option<&str>) -> ValidationResult {
    match value {
        Some(v) => require_name(field, v),
        None => Ok(()),
    }
}

pub fn require_positive(field: &str, value: f64) -> ValidationResult {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(field, "must be a positive number"));
    }
    Ok(())
}

pub fn optional_positive(field: &str, value: Option<f64>) -> ValidationResult {
    match value {
        Some(v) => require_positive(field, v),
        None => Ok(()),
    }
}

/// `later` must not precede `earlier` when both are present.
pub fn not_before(
    field: &str,
    later: Option<NaiveDate>,
    earlier: Option<NaiveDate>,
    earlier_field: &str,
) -> ValidationResult {
    if let (Some(later), Some(earlier)) = (later, earlier) {
        if later < earlier {
            return Err(ValidationError::new(
                field,
                format!("must not be before {}", earlier_field),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_name_rejects_blank() {
        let err = require_name("name", "   ").unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.to_string(), "name: must not be empty");
    }

    #[test]
    fn test_require_name_length_limit() {
        assert!(require_name("name", &"a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(require_name("name", &"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive("weightGrams", 55.2).is_ok());
        assert!(require_positive("weightGrams", 0.0).is_err());
        assert!(require_positive("weightGrams", f64::NAN).is_err());
    }

    #[test]
    fn test_not_before() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(not_before("hatchDate", Some(b), Some(a), "laidDate").is_ok());
        assert!(not_before("hatchDate", Some(a), Some(b), "laidDate").is_err());
        assert!(not_before("hatchDate", None, Some(b), "laidDate").is_ok());
    }
}
