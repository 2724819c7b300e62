use serde_json::json;
use sqlx::SqlitePool;

use super::{achievements, catalog, STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_NOT_STARTED};
use crate::db::analytics::{record_student_activity, track_content_engagement, Engagement};
use crate::db::models::achievement::AchievementType;
use crate::db::models::learning::{
    EnrollmentRepository, LearningModule, ModuleProgress, ModuleRepository, PathRepository,
    ProgressRepository,
};
use crate::db::now;
use crate::error::{AppError, AppResult};

/// Who is acting on a student's progress.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub student_id: String,
    pub session_id: Option<String>,
}

#[derive(Debug)]
pub struct ProgressOutcome {
    pub progress: ModuleProgress,
    pub module: LearningModule,
    /// True only on the update that moved the module to completed.
    pub just_completed: bool,
    pub achievements: Vec<AchievementType>,
}

/// Applies a progress report in place. Percentage never decreases and is kept
/// within 0..=100; time accumulates. Returns true when this report completes the module.
pub fn apply_progress(
    progress: &mut ModuleProgress,
    percentage: f64,
    minutes: i64,
    notes: Option<String>,
    at: &str,
) -> bool {
    let reported = percentage.clamp(0.0, 100.0).round() as i64;
    progress.progress_percentage = progress.progress_percentage.max(reported);
    progress.time_spent_minutes = progress.time_spent_minutes.saturating_add(minutes.max(0));
    progress.last_accessed = at.to_string();
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        progress.notes = Some(notes);
    }
    if progress.started_at.is_none() {
        progress.started_at = Some(at.to_string());
    }

    if progress.progress_percentage >= 100 && progress.status != STATUS_COMPLETED {
        progress.status = STATUS_COMPLETED.to_string();
        progress.completed_at = Some(at.to_string());
        return true;
    }
    if progress.status == STATUS_NOT_STARTED {
        progress.status = STATUS_IN_PROGRESS.to_string();
    }
    false
}

/// Integer share of completed modules, 0 for an empty path.
pub fn path_percentage(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (completed * 100 / total).min(100)
}

pub async fn start_module(pool: &SqlitePool, actor: &Actor, module_id: &str) -> AppResult<ModuleProgress> {
    let module = ModuleRepository::get(pool, module_id)
        .await?
        .ok_or_else(|| AppError::Validation("Module not found".to_string()))?;

    let enrollment = EnrollmentRepository::find_active(pool, &actor.student_id, &module.path_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Student does not have access to this module's learning path".to_string())
        })?;

    if catalog::is_module_locked(pool, &actor.student_id, &module).await? {
        return Err(AppError::Validation(
            "Module is locked. Complete previous modules first.".to_string(),
        ));
    }

    let progress = match ProgressRepository::find(pool, &actor.student_id, module_id).await? {
        Some(mut existing) => {
            let ts = now();
            if existing.status == STATUS_NOT_STARTED {
                existing.status = STATUS_IN_PROGRESS.to_string();
                existing.started_at = Some(ts.clone());
            }
            existing.last_accessed = ts;
            ProgressRepository::save(pool, &existing).await?
        }
        None => {
            ProgressRepository::create_in_progress(pool, &actor.student_id, module_id, &enrollment.id).await?
        }
    };

    let path_name = PathRepository::get(pool, &module.path_id)
        .await?
        .map(|p| p.name)
        .unwrap_or_default();

    record_student_activity(
        pool,
        &actor.user_id,
        &actor.student_id,
        "module_start",
        &json!({
            "module_id": module.id,
            "module_title": module.title,
            "path_name": path_name,
            "progress_percentage": progress.progress_percentage,
        }),
        actor.session_id.as_deref(),
    )
    .await;

    Ok(progress)
}

pub async fn update_progress(
    pool: &SqlitePool,
    actor: &Actor,
    module_id: &str,
    percentage: f64,
    minutes: i64,
    notes: Option<String>,
) -> AppResult<ProgressOutcome> {
    let mut progress = ProgressRepository::find(pool, &actor.student_id, module_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Module progress not found. Start the module first.".to_string())
        })?;
    let module = ModuleRepository::get(pool, module_id)
        .await?
        .ok_or_else(|| AppError::Validation("Module not found".to_string()))?;

    let old_percentage = progress.progress_percentage;
    let just_completed = apply_progress(&mut progress, percentage, minutes, notes, &now());
    let progress = ProgressRepository::save(pool, &progress).await?;

    let mut achievements = Vec::new();
    if just_completed {
        if let Some(enrollment) = EnrollmentRepository::get(pool, &progress.student_path_id).await? {
            let total = ModuleRepository::count_active_for_path(pool, &enrollment.path_id).await?;
            let completed =
                ProgressRepository::count_completed_in_enrollment(pool, &actor.student_id, &enrollment).await?;
            EnrollmentRepository::set_progress(pool, &enrollment.id, path_percentage(completed, total)).await?;
        }
        achievements =
            achievements::check_progress_achievements(pool, &actor.user_id, &actor.student_id).await?;
    }

    record_student_activity(
        pool,
        &actor.user_id,
        &actor.student_id,
        "module_progress",
        &json!({
            "module_id": module_id,
            "old_progress": old_percentage,
            "new_progress": progress.progress_percentage,
            "progress_percentage": progress.progress_percentage,
            "time_spent_minutes": minutes,
            "status": progress.status,
        }),
        actor.session_id.as_deref(),
    )
    .await;

    Ok(ProgressOutcome { progress, module, just_completed, achievements })
}

pub struct Completion {
    pub final_time_spent: i64,
    pub difficulty_rating: Option<i64>,
    pub feedback: Option<String>,
    pub project_submission: Option<String>,
}

/// Drives the module to 100% and records the completion engagement.
pub async fn complete_module(
    pool: &SqlitePool,
    actor: &Actor,
    module_id: &str,
    completion: Completion,
) -> AppResult<ProgressOutcome> {
    let outcome = update_progress(pool, actor, module_id, 100.0, completion.final_time_spent, None).await?;

    record_student_activity(
        pool,
        &actor.user_id,
        &actor.student_id,
        "module_complete",
        &json!({
            "module_id": module_id,
            "progress_percentage": 100,
            "total_time_spent": outcome.progress.time_spent_minutes,
            "difficulty_rating": completion.difficulty_rating,
            "feedback": completion.feedback,
            "project_submission": completion.project_submission,
        }),
        actor.session_id.as_deref(),
    )
    .await;

    track_content_engagement(
        pool.clone(),
        Engagement {
            content_type: "module".to_string(),
            content_id: module_id.to_string(),
            content_title: Some(outcome.module.title.clone()),
            student_id: actor.student_id.clone(),
            session_id: actor.session_id.clone(),
            time_spent_minutes: completion.final_time_spent,
            completion_percentage: 100.0,
            rating: completion.difficulty_rating,
            feedback: completion.feedback,
        },
    );

    Ok(outcome)
}
