use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool};

use crate::db::{new_id, now};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub student_name: String,
    pub age: i64,
    pub grade_level: Option<String>,
    pub school_name: Option<String>,
    pub parent_name: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_conditions: Option<String>,
    pub dietary_restrictions: Option<String>,
    #[serde(skip_serializing)]
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub student_name: String,
    pub age: i64,
    pub grade_level: Option<String>,
    pub school_name: Option<String>,
    pub parent_name: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_conditions: Option<String>,
    pub dietary_restrictions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStudent {
    pub student_name: Option<String>,
    pub age: Option<i64>,
    pub grade_level: Option<String>,
    pub school_name: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_conditions: Option<String>,
    pub dietary_restrictions: Option<String>,
}

impl UpdateStudent {
    /// Names of the fields present in the request, in column order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.student_name.is_some() { fields.push("student_name"); }
        if self.age.is_some() { fields.push("age"); }
        if self.grade_level.is_some() { fields.push("grade_level"); }
        if self.school_name.is_some() { fields.push("school_name"); }
        if self.emergency_contact.is_some() { fields.push("emergency_contact"); }
        if self.medical_conditions.is_some() { fields.push("medical_conditions"); }
        if self.dietary_restrictions.is_some() { fields.push("dietary_restrictions"); }
        fields
    }
}

/// Row returned by the admin student listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StudentSummary {
    pub id: String,
    pub student_name: String,
    pub age: i64,
    pub user_email: String,
    pub created_at: String,
    pub assessment_completed: bool,
    pub current_learning_path: Option<String>,
    pub modules_completed: i64,
    pub total_learning_time: i64,
    pub last_activity: Option<String>,
}

pub struct StudentRepository;

impl StudentRepository {
    pub async fn insert<'e, E>(executor: E, user_id: &str, student: &NewStudent) -> sqlx::Result<Student>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let ts = now();
        sqlx::query_as::<_, Student>(
            "INSERT INTO students
                (id, user_id, student_name, age, grade_level, school_name, parent_name,
                 emergency_contact, medical_conditions, dietary_restrictions,
                 is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
             RETURNING *"
        )
        .bind(new_id())
        .bind(user_id)
        .bind(&student.student_name)
        .bind(student.age)
        .bind(student.grade_level.as_deref())
        .bind(student.school_name.as_deref())
        .bind(student.parent_name.as_deref())
        .bind(student.emergency_contact.as_deref())
        .bind(student.medical_conditions.as_deref())
        .bind(student.dietary_restrictions.as_deref())
        .bind(&ts)
        .bind(&ts)
        .fetch_one(executor)
        .await
    }

    /// Active student owned by `user_id`. Any other student is invisible to the caller.
    pub async fn find_owned(
        pool: &SqlitePool,
        student_id: &str,
        user_id: &str,
    ) -> sqlx::Result<Option<Student>> {
        sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE id = ? AND user_id = ? AND is_active = 1"
        )
        .bind(student_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_active_for_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<Student>> {
        sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE user_id = ? AND is_active = 1 ORDER BY created_at ASC"
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, id: &str, req: &UpdateStudent) -> sqlx::Result<Student> {
        let mut set_clauses = vec!["updated_at = ?"];
        for field in req.field_names() {
            set_clauses.push(match field {
                "student_name" => "student_name = ?",
                "age" => "age = ?",
                "grade_level" => "grade_level = ?",
                "school_name" => "school_name = ?",
                "emergency_contact" => "emergency_contact = ?",
                "medical_conditions" => "medical_conditions = ?",
                _ => "dietary_restrictions = ?",
            });
        }

        let query = format!(
            "UPDATE students SET {} WHERE id = ? RETURNING *",
            set_clauses.join(", ")
        );

        let mut q = sqlx::query_as::<_, Student>(&query).bind(now());
        if let Some(v) = &req.student_name {
            q = q.bind(v);
        }
        if let Some(v) = req.age {
            q = q.bind(v);
        }
        if let Some(v) = &req.grade_level {
            q = q.bind(v);
        }
        if let Some(v) = &req.school_name {
            q = q.bind(v);
        }
        if let Some(v) = &req.emergency_contact {
            q = q.bind(v);
        }
        if let Some(v) = &req.medical_conditions {
            q = q.bind(v);
        }
        if let Some(v) = &req.dietary_restrictions {
            q = q.bind(v);
        }
        q.bind(id).fetch_one(pool).await
    }

    pub async fn list_summaries(
        pool: &SqlitePool,
        search: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> sqlx::Result<Vec<StudentSummary>> {
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));
        sqlx::query_as::<_, StudentSummary>(
            "SELECT s.id, s.student_name, s.age, u.email AS user_email, s.created_at,
                    EXISTS (SELECT 1 FROM student_assessments a
                            WHERE a.student_id = s.id AND a.is_completed = 1) AS assessment_completed,
                    (SELECT p.name FROM student_learning_paths sp
                     JOIN learning_paths p ON p.id = sp.path_id
                     WHERE sp.student_id = s.id AND sp.is_active = 1
                     ORDER BY sp.assigned_at DESC LIMIT 1) AS current_learning_path,
                    (SELECT COUNT(*) FROM student_module_progress m
                     WHERE m.student_id = s.id AND m.status = 'completed') AS modules_completed,
                    (SELECT COALESCE(SUM(m.time_spent_minutes), 0) FROM student_module_progress m
                     WHERE m.student_id = s.id) AS total_learning_time,
                    (SELECT MAX(m.last_accessed) FROM student_module_progress m
                     WHERE m.student_id = s.id) AS last_activity
             FROM students s
             JOIN users u ON u.id = s.user_id
             WHERE s.is_active = 1
               AND (?1 IS NULL OR LOWER(s.student_name) LIKE ?1)
             ORDER BY s.created_at DESC
             LIMIT ?2 OFFSET ?3"
        )
        .bind(pattern)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_follow_request() {
        let req = UpdateStudent {
            age: Some(11),
            school_name: Some("Hillside".to_string()),
            ..Default::default()
        };
        assert_eq!(req.field_names(), vec!["age", "school_name"]);
        assert!(UpdateStudent::default().field_names().is_empty());
    }
}
