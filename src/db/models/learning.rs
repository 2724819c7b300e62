use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearningPath {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: Option<String>,
    pub difficulty_level: String,
    pub estimated_hours: i64,
    pub sort_order: i64,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub created_at: String,
    #[serde(skip_serializing)]
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LearningModule {
    pub id: String,
    pub path_id: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub difficulty_level: String,
    pub estimated_hours: i64,
    pub sort_order: i64,
    pub learning_objectives: String,  // JSON array as string
    pub topics: String,               // JSON array as string
    pub is_locked: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl LearningModule {
    pub fn objectives_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.learning_objectives).unwrap_or_default()
    }

    pub fn topics_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.topics).unwrap_or_default()
    }
}

/// A student's enrollment in a learning path.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub path_id: String,
    pub assigned_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub progress_percentage: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModuleProgress {
    pub id: String,
    #[serde(skip_serializing)]
    pub student_id: String,
    pub module_id: String,
    #[serde(skip_serializing)]
    pub student_path_id: String,
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub progress_percentage: i64,
    pub time_spent_minutes: i64,
    pub last_accessed: String,
    pub notes: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: String,
    #[serde(skip_serializing)]
    pub updated_at: String,
}

pub struct PathRepository;

impl PathRepository {
    pub async fn list_active(pool: &SqlitePool) -> sqlx::Result<Vec<LearningPath>> {
        sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths WHERE is_active = 1 ORDER BY sort_order ASC"
        )
        .fetch_all(pool)
        .await
    }

    /// Active paths paired with their active module count.
    pub async fn list_active_with_module_counts(
        pool: &SqlitePool,
    ) -> sqlx::Result<Vec<(LearningPath, i64)>> {
        let paths = Self::list_active(pool).await?;
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT path_id, COUNT(*) FROM learning_modules WHERE is_active = 1 GROUP BY path_id"
        )
        .fetch_all(pool)
        .await?;

        Ok(paths
            .into_iter()
            .map(|p| {
                let count = counts
                    .iter()
                    .find(|(path_id, _)| *path_id == p.id)
                    .map(|(_, c)| *c)
                    .unwrap_or(0);
                (p, count)
            })
            .collect())
    }

    pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<LearningPath>> {
        sqlx::query_as::<_, LearningPath>("SELECT * FROM learning_paths WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn get_active(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<LearningPath>> {
        sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths WHERE id = ? AND is_active = 1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_active_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<LearningPath>> {
        sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths WHERE name = ? AND is_active = 1"
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_active_by_slug(pool: &SqlitePool, slug: &str) -> sqlx::Result<Option<LearningPath>> {
        sqlx::query_as::<_, LearningPath>(
            "SELECT * FROM learning_paths WHERE slug = ? AND is_active = 1"
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }
}

pub struct ModuleRepository;

impl ModuleRepository {
    pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<LearningModule>> {
        sqlx::query_as::<_, LearningModule>("SELECT * FROM learning_modules WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn get_active(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<LearningModule>> {
        sqlx::query_as::<_, LearningModule>(
            "SELECT * FROM learning_modules WHERE id = ? AND is_active = 1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_active_for_path(pool: &SqlitePool, path_id: &str) -> sqlx::Result<Vec<LearningModule>> {
        sqlx::query_as::<_, LearningModule>(
            "SELECT * FROM learning_modules
             WHERE path_id = ? AND is_active = 1
             ORDER BY sort_order ASC"
        )
        .bind(path_id)
        .fetch_all(pool)
        .await
    }

    /// The active module directly before `module` in its path, if any.
    pub async fn predecessor(
        pool: &SqlitePool,
        module: &LearningModule,
    ) -> sqlx::Result<Option<LearningModule>> {
        sqlx::query_as::<_, LearningModule>(
            "SELECT * FROM learning_modules
             WHERE path_id = ? AND sort_order = ? AND is_active = 1
             LIMIT 1"
        )
        .bind(&module.path_id)
        .bind(module.sort_order - 1)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_active_for_path(pool: &SqlitePool, path_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM learning_modules WHERE path_id = ? AND is_active = 1"
        )
        .bind(path_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

pub struct EnrollmentRepository;

impl EnrollmentRepository {
    /// Creates the enrollment or reactivates an existing one, refreshing `assigned_at`.
    pub async fn assign(pool: &SqlitePool, student_id: &str, path_id: &str) -> sqlx::Result<Enrollment> {
        sqlx::query_as::<_, Enrollment>(
            "INSERT INTO student_learning_paths
                (id, student_id, path_id, assigned_at, progress_percentage, is_active)
             VALUES (?, ?, ?, ?, 0, 1)
             ON CONFLICT (student_id, path_id)
             DO UPDATE SET is_active = 1, assigned_at = excluded.assigned_at
             RETURNING *"
        )
        .bind(new_id())
        .bind(student_id)
        .bind(path_id)
        .bind(now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_active(
        pool: &SqlitePool,
        student_id: &str,
        path_id: &str,
    ) -> sqlx::Result<Option<Enrollment>> {
        sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM student_learning_paths
             WHERE student_id = ? AND path_id = ? AND is_active = 1"
        )
        .bind(student_id)
        .bind(path_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Enrollment>> {
        sqlx::query_as::<_, Enrollment>("SELECT * FROM student_learning_paths WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently assigned active enrollment.
    pub async fn current(pool: &SqlitePool, student_id: &str) -> sqlx::Result<Option<Enrollment>> {
        sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM student_learning_paths
             WHERE student_id = ? AND is_active = 1
             ORDER BY assigned_at DESC
             LIMIT 1"
        )
        .bind(student_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_active(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_learning_paths WHERE student_id = ? AND is_active = 1"
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn count_completed(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_learning_paths
             WHERE student_id = ? AND completed_at IS NOT NULL"
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Stores the recomputed percentage. `started_at` is set on first update and
    /// `completed_at` once the path reaches 100%.
    pub async fn set_progress(pool: &SqlitePool, id: &str, percentage: i64) -> sqlx::Result<()> {
        let ts = now();
        sqlx::query(
            "UPDATE student_learning_paths
             SET progress_percentage = ?,
                 started_at = COALESCE(started_at, ?),
                 completed_at = CASE WHEN ? >= 100 THEN COALESCE(completed_at, ?) ELSE completed_at END
             WHERE id = ?"
        )
        .bind(percentage)
        .bind(&ts)
        .bind(percentage)
        .bind(&ts)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Active module count across every active enrollment of the student.
    pub async fn total_modules(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(m.id)
             FROM learning_modules m
             JOIN student_learning_paths sp ON sp.path_id = m.path_id
             WHERE sp.student_id = ? AND sp.is_active = 1 AND m.is_active = 1"
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

pub struct ProgressRepository;

impl ProgressRepository {
    pub async fn find(
        pool: &SqlitePool,
        student_id: &str,
        module_id: &str,
    ) -> sqlx::Result<Option<ModuleProgress>> {
        sqlx::query_as::<_, ModuleProgress>(
            "SELECT * FROM student_module_progress WHERE student_id = ? AND module_id = ?"
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create_in_progress(
        pool: &SqlitePool,
        student_id: &str,
        module_id: &str,
        student_path_id: &str,
    ) -> sqlx::Result<ModuleProgress> {
        let ts = now();
        sqlx::query_as::<_, ModuleProgress>(
            "INSERT INTO student_module_progress
                (id, student_id, module_id, student_path_id, status, started_at,
                 progress_percentage, time_spent_minutes, last_accessed, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'in_progress', ?, 0, 0, ?, ?, ?)
             RETURNING *"
        )
        .bind(new_id())
        .bind(student_id)
        .bind(module_id)
        .bind(student_path_id)
        .bind(&ts)
        .bind(&ts)
        .bind(&ts)
        .bind(&ts)
        .fetch_one(pool)
        .await
    }

    /// Persists every mutable column of a progress row.
    pub async fn save(pool: &SqlitePool, progress: &ModuleProgress) -> sqlx::Result<ModuleProgress> {
        sqlx::query_as::<_, ModuleProgress>(
            "UPDATE student_module_progress
             SET status = ?, started_at = ?, completed_at = ?, progress_percentage = ?,
                 time_spent_minutes = ?, last_accessed = ?, notes = ?, updated_at = ?
             WHERE id = ?
             RETURNING *"
        )
        .bind(&progress.status)
        .bind(progress.started_at.as_deref())
        .bind(progress.completed_at.as_deref())
        .bind(progress.progress_percentage)
        .bind(progress.time_spent_minutes)
        .bind(&progress.last_accessed)
        .bind(progress.notes.as_deref())
        .bind(now())
        .bind(&progress.id)
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_student(
        pool: &SqlitePool,
        student_id: &str,
        path_id: Option<&str>,
    ) -> sqlx::Result<Vec<ModuleProgress>> {
        sqlx::query_as::<_, ModuleProgress>(
            "SELECT p.* FROM student_module_progress p
             JOIN learning_modules m ON m.id = p.module_id
             WHERE p.student_id = ?1 AND (?2 IS NULL OR m.path_id = ?2)
             ORDER BY p.last_accessed DESC"
        )
        .bind(student_id)
        .bind(path_id)
        .fetch_all(pool)
        .await
    }

    pub async fn is_completed(pool: &SqlitePool, student_id: &str, module_id: &str) -> sqlx::Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_module_progress
             WHERE student_id = ? AND module_id = ? AND status = 'completed'"
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn count_completed(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_module_progress WHERE student_id = ? AND status = 'completed'"
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn count_completed_since(pool: &SqlitePool, student_id: &str, since: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_module_progress
             WHERE student_id = ? AND status = 'completed' AND completed_at >= ?"
        )
        .bind(student_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn count_completed_in_enrollment(
        pool: &SqlitePool,
        student_id: &str,
        enrollment: &Enrollment,
    ) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_module_progress p
             JOIN learning_modules m ON m.id = p.module_id
             WHERE p.student_id = ? AND m.path_id = ? AND m.is_active = 1 AND p.status = 'completed'"
        )
        .bind(student_id)
        .bind(&enrollment.path_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn total_minutes(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (minutes,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(time_spent_minutes), 0) FROM student_module_progress WHERE student_id = ?"
        )
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(minutes)
    }

    /// Distinct UTC days (YYYY-MM-DD) with learning activity, newest first.
    pub async fn activity_days(pool: &SqlitePool, student_id: &str) -> sqlx::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT day FROM (
                 SELECT substr(last_accessed, 1, 10) AS day FROM student_module_progress WHERE student_id = ?1
                 UNION
                 SELECT substr(started_at, 1, 10) FROM student_module_progress
                 WHERE student_id = ?1 AND started_at IS NOT NULL
                 UNION
                 SELECT substr(completed_at, 1, 10) FROM student_module_progress
                 WHERE student_id = ?1 AND completed_at IS NOT NULL
                 UNION
                 SELECT substr(session_start, 1, 10) FROM learning_sessions WHERE student_id = ?1
             )
             ORDER BY day DESC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }
}
