use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::now;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ErrorLog {
    pub id: String,
    pub error_type: String,
    pub error_category: String,
    pub severity: String,
    pub error_message: String,
    pub error_code: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub endpoint: Option<String>,
    pub request_method: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub resolved: bool,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
    pub occurred_at: String,
}

#[derive(Debug, Default)]
pub struct ErrorFilter<'a> {
    pub severity: Option<&'a str>,
    pub resolved: Option<bool>,
    pub since: String,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailyActivity {
    pub date: String,
    pub actions: i64,
    pub active_users: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FeatureUsage {
    pub feature: String,
    pub usage_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LearningSessionSummary {
    pub total_sessions: i64,
    pub total_minutes: i64,
    pub average_session_minutes: f64,
    pub average_progress: f64,
    pub modules_touched: i64,
}

pub struct ErrorLogRepository;

impl ErrorLogRepository {
    pub async fn list(pool: &SqlitePool, filter: &ErrorFilter<'_>) -> sqlx::Result<Vec<ErrorLog>> {
        sqlx::query_as::<_, ErrorLog>(
            "SELECT * FROM error_logs
             WHERE occurred_at >= ?1
               AND (?2 IS NULL OR severity = ?2)
               AND (?3 IS NULL OR resolved = ?3)
             ORDER BY occurred_at DESC
             LIMIT ?4 OFFSET ?5"
        )
        .bind(&filter.since)
        .bind(filter.severity)
        .bind(filter.resolved)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(pool)
        .await
    }

    /// Returns false when no such error exists.
    pub async fn resolve(pool: &SqlitePool, id: &str, resolved_by: &str) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE error_logs SET resolved = 1, resolved_at = ?, resolved_by = ? WHERE id = ?"
        )
        .bind(now())
        .bind(resolved_by)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_since(pool: &SqlitePool, since: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM error_logs WHERE occurred_at >= ?")
            .bind(since)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn count_unresolved_critical(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM error_logs WHERE severity = 'critical' AND resolved = 0"
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

/// Aggregate reads over the tracking tables.
pub struct ActivityRepository;

impl ActivityRepository {
    pub async fn count_users(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn count_students(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students WHERE is_active = 1")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn count_completed_modules(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM student_module_progress WHERE status = 'completed'"
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn total_learning_minutes(pool: &SqlitePool) -> sqlx::Result<i64> {
        let (minutes,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(time_spent_minutes), 0) FROM student_module_progress"
        )
        .fetch_one(pool)
        .await?;
        Ok(minutes)
    }

    pub async fn active_users_since(pool: &SqlitePool, since: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id) FROM user_actions
             WHERE performed_at >= ? AND user_id IS NOT NULL"
        )
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn average_response_ms_since(pool: &SqlitePool, since: &str) -> sqlx::Result<f64> {
        let (avg,): (Option<f64>,) = sqlx::query_as(
            "SELECT AVG(metric_value) FROM system_metrics
             WHERE metric_name = 'response_time' AND recorded_at >= ?"
        )
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(avg.unwrap_or(0.0))
    }

    pub async fn daily_activity(pool: &SqlitePool, since: &str) -> sqlx::Result<Vec<DailyActivity>> {
        sqlx::query_as::<_, DailyActivity>(
            "SELECT substr(performed_at, 1, 10) AS date,
                    COUNT(*) AS actions,
                    COUNT(DISTINCT user_id) AS active_users
             FROM user_actions
             WHERE performed_at >= ?
             GROUP BY date
             ORDER BY date ASC"
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }

    pub async fn popular_features(pool: &SqlitePool, since: &str) -> sqlx::Result<Vec<FeatureUsage>> {
        sqlx::query_as::<_, FeatureUsage>(
            "SELECT action_type AS feature, COUNT(*) AS usage_count
             FROM user_actions
             WHERE performed_at >= ?
             GROUP BY action_type
             ORDER BY usage_count DESC, feature ASC
             LIMIT 10"
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Session totals for one student, or for everyone when `student_id` is None.
    pub async fn learning_sessions_since(
        pool: &SqlitePool,
        student_id: Option<&str>,
        since: &str,
    ) -> sqlx::Result<LearningSessionSummary> {
        sqlx::query_as::<_, LearningSessionSummary>(
            "SELECT COUNT(*) AS total_sessions,
                    COALESCE(SUM(session_duration), 0) AS total_minutes,
                    COALESCE(AVG(session_duration), 0.0) AS average_session_minutes,
                    COALESCE(AVG(progress_percentage), 0.0) AS average_progress,
                    COUNT(DISTINCT module_id) AS modules_touched
             FROM learning_sessions
             WHERE session_start >= ?1 AND (?2 IS NULL OR student_id = ?2)"
        )
        .bind(since)
        .bind(student_id)
        .fetch_one(pool)
        .await
    }
}
