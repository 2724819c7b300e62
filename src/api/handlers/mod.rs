pub mod admin;
pub mod assessments;
pub mod auth;
pub mod health;
pub mod learning;
pub mod metrics;
pub mod students;

use crate::auth::rbac::{has_permission, Permission};
use crate::db::models::student::{Student, StudentRepository};
use crate::db::models::user::User;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

/// Active student owned by the caller; anything else is reported as missing.
pub(crate) async fn owned_student(db: &DbPool, student_id: &str, user: &User) -> AppResult<Student> {
    if !has_permission(&user.role, &Permission::ManageOwnStudents) {
        return Err(AppError::Forbidden("Not allowed to manage students".to_string()));
    }
    StudentRepository::find_owned(db, student_id, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
}

/// Rounds to two decimal places for reporting.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(2.0051), 2.01);
    }
}
