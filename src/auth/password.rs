use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>?";
const COMMON_PASSWORDS: [&str; 5] = ["password", "123456", "password123", "admin", "letmein"];

pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct StrengthReport {
    pub is_valid: bool,
    pub score: u8,
    pub feedback: Vec<String>,
}

/// Scores a candidate password. Strong mode needs 5 points, relaxed mode 2.
pub fn check_strength(password: &str, min_length: usize, require_strong: bool) -> StrengthReport {
    let mut score = 0u8;
    let mut feedback = Vec::new();

    if password.chars().count() >= min_length {
        score += 2;
    } else {
        feedback.push(format!("Password must be at least {} characters long", min_length));
    }

    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 1;
    } else {
        feedback.push("Password must contain at least one uppercase letter".to_string());
    }

    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 1;
    } else {
        feedback.push("Password must contain at least one lowercase letter".to_string());
    }

    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    } else {
        feedback.push("Password must contain at least one number".to_string());
    }

    if password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        score += 2;
    } else {
        feedback.push("Password must contain at least one special character".to_string());
    }

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        score = 0;
        feedback.push("Password is too common and easily guessed".to_string());
    }

    let is_valid = if require_strong { score >= 5 } else { score >= 2 };
    StrengthReport { is_valid, score, feedback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_correct_password() {
        let password = "Secure-password-123";
        let hash = hash(password).expect("Should hash password");
        assert!(!hash.is_empty());
        assert!(verify(password, &hash), "Correct password should verify");
    }

    #[test]
    fn test_wrong_password_fails_verification() {
        let hash = hash("correct-password").expect("Should hash");
        assert!(!verify("wrong-password", &hash), "Wrong password should fail");
    }

    #[test]
    fn test_two_hashes_of_same_password_differ() {
        let h1 = hash("same-password").expect("Should hash");
        let h2 = hash("same-password").expect("Should hash");
        assert_ne!(h1, h2);
        assert!(verify("same-password", &h1));
        assert!(verify("same-password", &h2));
    }

    #[test]
    fn test_malformed_hash_returns_false() {
        assert!(!verify("any-password", "not-a-valid-hash-string"));
        assert!(!verify("any-password", ""));
    }

    #[test]
    fn test_hash_output_is_argon2_format() {
        let h = hash("test").expect("Should hash");
        assert!(h.starts_with("$argon2"), "Hash should be in PHC format, got: {}", h);
    }

    #[test]
    fn test_strong_password_scores_seven() {
        let report = check_strength("Sunflower#42", 8, true);
        assert!(report.is_valid);
        assert_eq!(report.score, 7);
        assert!(report.feedback.is_empty());
    }

    #[test]
    fn test_missing_special_char_is_still_valid() {
        // length 2 + upper 1 + lower 1 + digit 1 = 5
        let report = check_strength("Sunflower42", 8, true);
        assert!(report.is_valid);
        assert_eq!(report.score, 5);
        assert_eq!(report.feedback.len(), 1);
    }

    #[test]
    fn test_short_lowercase_password_rejected_in_strong_mode() {
        let report = check_strength("abc", 8, true);
        assert!(!report.is_valid);
        assert_eq!(report.score, 1);
        assert_eq!(report.feedback.len(), 4);
    }

    #[test]
    fn test_relaxed_mode_accepts_two_points() {
        let report = check_strength("abcdefghij", 8, false);
        assert!(report.is_valid);
        assert_eq!(report.score, 3);
    }

    #[test]
    fn test_common_password_scores_zero() {
        let report = check_strength("Password123", 8, false);
        assert_eq!(report.score, 0);
        assert!(!report.is_valid);
        assert!(report
            .feedback
            .iter()
            .any(|f| f.contains("too common")));
    }
}
