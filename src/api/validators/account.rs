use regex::Regex;
use std::sync::LazyLock;

use super::{ValidationError, Validator};

const MAX_EMAIL_LEN: usize = 254;
const MAX_INPUT_CHARS: usize = 1000;

pub const MIN_STUDENT_AGE: i64 = 5;
pub const MAX_STUDENT_AGE: i64 = 18;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Invalid regex")
});

pub struct EmailValidator;

impl Validator<str> for EmailValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let s = input.trim();

        if s.is_empty() {
            return Err(ValidationError {
                code: "E101".to_string(),
                message: "Email is required".to_string(),
                field: "email".to_string(),
                suggestion: None,
            });
        }

        if s.len() > MAX_EMAIL_LEN {
            return Err(ValidationError {
                code: "E102".to_string(),
                message: format!("Email exceeds {} characters", MAX_EMAIL_LEN),
                field: "email".to_string(),
                suggestion: None,
            });
        }

        if !EMAIL.is_match(s) {
            return Err(ValidationError {
                code: "E103".to_string(),
                message: "Invalid email format".to_string(),
                field: "email".to_string(),
                suggestion: Some("Use an address like parent@example.com".to_string()),
            });
        }

        Ok(())
    }
}

pub struct AgeValidator;

impl Validator<i64> for AgeValidator {
    fn validate(&self, age: &i64) -> Result<(), ValidationError> {
        if !(MIN_STUDENT_AGE..=MAX_STUDENT_AGE).contains(age) {
            return Err(ValidationError {
                code: "E201".to_string(),
                message: format!(
                    "Student age must be between {} and {}",
                    MIN_STUDENT_AGE, MAX_STUDENT_AGE
                ),
                field: "age".to_string(),
                suggestion: None,
            });
        }
        Ok(())
    }
}

/// Strips NUL bytes, trims, and caps free text at 1000 characters.
pub fn sanitize(input: &str) -> String {
    input
        .replace('\0', "")
        .trim()
        .chars()
        .take(MAX_INPUT_CHARS)
        .collect()
}

pub fn sanitize_opt(input: Option<String>) -> Option<String> {
    input.map(|s| sanitize(&s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        let v = EmailValidator;
        assert!(v.validate("parent@example.com").is_ok());
        assert!(v.validate("first.last+kids@school.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        let v = EmailValidator;
        assert_eq!(v.validate("").unwrap_err().code, "E101");
        assert_eq!(v.validate("no-at-sign.com").unwrap_err().code, "E103");
        assert_eq!(v.validate("a@b.c").unwrap_err().code, "E103");
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(v.validate(&long).unwrap_err().code, "E102");
    }

    #[test]
    fn test_age_bounds() {
        let v = AgeValidator;
        assert!(v.validate(&5).is_ok());
        assert!(v.validate(&18).is_ok());
        assert!(v.validate(&4).is_err());
        assert!(v.validate(&19).is_err());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  Ada\0 Lovelace  "), "Ada Lovelace");
        assert_eq!(sanitize(&"x".repeat(1500)).len(), 1000);
        assert_eq!(sanitize_opt(Some(" hi ".to_string())), Some("hi".to_string()));
        assert_eq!(sanitize_opt(None), None);
    }
}
