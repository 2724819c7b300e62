use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AchievementType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub badge_color: Option<String>,
    pub points: i64,
    pub is_active: bool,
    pub created_at: String,
}

/// A badge a student has earned, joined with its type.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarnedAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub badge_color: Option<String>,
    pub points: i64,
    pub earned_at: String,
}

pub struct AchievementRepository;

impl AchievementRepository {
    pub async fn find_type_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<AchievementType>> {
        sqlx::query_as::<_, AchievementType>(
            "SELECT * FROM achievement_types WHERE name = ? AND is_active = 1"
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Awards the named badge unless the student already has it.
    /// Returns the badge only when it was newly earned.
    pub async fn award_if_new(
        pool: &SqlitePool,
        student_id: &str,
        name: &str,
    ) -> sqlx::Result<Option<AchievementType>> {
        let Some(kind) = Self::find_type_by_name(pool, name).await? else {
            tracing::warn!("Achievement type '{}' is not configured", name);
            return Ok(None);
        };

        let result = sqlx::query(
            "INSERT OR IGNORE INTO student_achievements (id, student_id, achievement_type_id, earned_at)
             VALUES (?, ?, ?, ?)"
        )
        .bind(new_id())
        .bind(student_id)
        .bind(&kind.id)
        .bind(now())
        .execute(pool)
        .await?;

        Ok((result.rows_affected() > 0).then_some(kind))
    }

    pub async fn list_for_student(
        pool: &SqlitePool,
        student_id: &str,
        limit: Option<i64>,
    ) -> sqlx::Result<Vec<EarnedAchievement>> {
        sqlx::query_as::<_, EarnedAchievement>(
            "SELECT sa.id, t.name, t.description, t.icon, t.badge_color, t.points, sa.earned_at
             FROM student_achievements sa
             JOIN achievement_types t ON t.id = sa.achievement_type_id
             WHERE sa.student_id = ?
             ORDER BY sa.earned_at DESC
             LIMIT ?"
        )
        .bind(student_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_student(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM student_achievements WHERE student_id = ?")
                .bind(student_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}
