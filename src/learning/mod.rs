//! Learning domain: path lookup, the module progress state machine,
//! achievement rules and path recommendations.

pub mod achievements;
pub mod catalog;
pub mod progress;
pub mod recommend;

pub const STATUS_NOT_STARTED: &str = "not_started";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

/// Upper bound for any single reported duration, in minutes (one day).
pub const MAX_REPORTED_MINUTES: i64 = 24 * 60;

/// Rejects a reported duration outside `0..=MAX_REPORTED_MINUTES`.
pub fn check_minutes(field: &str, minutes: i64) -> crate::error::AppResult<()> {
    if (0..=MAX_REPORTED_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(crate::error::AppError::Validation(format!(
            "{} must be between 0 and {} minutes",
            field, MAX_REPORTED_MINUTES
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_minutes_bounds() {
        assert!(check_minutes("time", 0).is_ok());
        assert!(check_minutes("time", MAX_REPORTED_MINUTES).is_ok());
        assert!(check_minutes("time", -1).is_err());
        assert!(check_minutes("time", MAX_REPORTED_MINUTES + 1).is_err());
        assert!(check_minutes("time", i64::MAX).is_err());
    }
}
