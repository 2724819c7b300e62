use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::SqlitePool;

use crate::db::analytics::track_student_activity;
use crate::db::models::achievement::{AchievementRepository, AchievementType};
use crate::db::models::learning::{EnrollmentRepository, ProgressRepository};
use crate::db::timestamp;

pub const FIRST_STEPS: &str = "First Steps";
pub const QUICK_LEARNER: &str = "Quick Learner";
pub const PATH_COMPLETER: &str = "Path Completer";
pub const PERFECT_SCORE: &str = "Perfect Score";
pub const LEARNING_STREAK: &str = "Learning Streak";

const QUICK_LEARNER_MODULES: i64 = 3;
const STREAK_DAYS: i64 = 7;

/// Consecutive days with activity ending today, or yesterday if today has none yet.
/// `days` may be unsorted and contain duplicates.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> i64 {
    let mut days: Vec<NaiveDate> = days.iter().copied().filter(|d| *d <= today).collect();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();

    let Some(&latest) = days.first() else {
        return 0;
    };
    if (today - latest).num_days() > 1 {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

pub async fn student_streak(pool: &SqlitePool, student_id: &str) -> sqlx::Result<i64> {
    let days: Vec<NaiveDate> = ProgressRepository::activity_days(pool, student_id)
        .await?
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .collect();
    Ok(current_streak(&days, Utc::now().date_naive()))
}

/// Awards a badge and records the `achievement_earned` activity when it is new.
pub async fn award(
    pool: &SqlitePool,
    user_id: &str,
    student_id: &str,
    name: &str,
) -> sqlx::Result<Option<AchievementType>> {
    let earned = AchievementRepository::award_if_new(pool, student_id, name).await?;
    if let Some(kind) = &earned {
        tracing::info!("Student {} earned '{}'", student_id, kind.name);
        track_student_activity(
            pool.clone(),
            user_id.to_string(),
            student_id.to_string(),
            "achievement_earned".to_string(),
            json!({ "achievement_name": kind.name, "achievement_points": kind.points }),
            None,
        );
    }
    Ok(earned)
}

/// Evaluates the progress-based badges. Returns the ones newly earned.
pub async fn check_progress_achievements(
    pool: &SqlitePool,
    user_id: &str,
    student_id: &str,
) -> sqlx::Result<Vec<AchievementType>> {
    let mut earned = Vec::new();

    let total_completed = ProgressRepository::count_completed(pool, student_id).await?;
    if total_completed >= 1 {
        earned.extend(award(pool, user_id, student_id, FIRST_STEPS).await?);
    }

    let midnight = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| timestamp(t.and_utc()))
        .unwrap_or_default();
    let today_completed = ProgressRepository::count_completed_since(pool, student_id, &midnight).await?;
    if today_completed >= QUICK_LEARNER_MODULES {
        earned.extend(award(pool, user_id, student_id, QUICK_LEARNER).await?);
    }

    if EnrollmentRepository::count_completed(pool, student_id).await? >= 1 {
        earned.extend(award(pool, user_id, student_id, PATH_COMPLETER).await?);
    }

    if student_streak(pool, student_id).await? >= STREAK_DAYS {
        earned.extend(award(pool, user_id, student_id, LEARNING_STREAK).await?);
    }

    Ok(earned)
}
