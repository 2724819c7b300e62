use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{owned_student, round2};
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::headers::SessionId;
use crate::api::validators::sanitize_opt;
use crate::api::AppState;
use crate::db::analytics::{track_content_engagement, track_user_action, Engagement, UserAction};
use crate::db::models::analytics::ActivityRepository;
use crate::db::models::learning::{
    EnrollmentRepository, ModuleRepository, PathRepository, ProgressRepository,
};
use crate::db::models::student::Student;
use crate::db::models::user::User;
use crate::db::timestamp;
use crate::email::templates;
use crate::error::{AppError, AppResult};
use crate::learning::{catalog, check_minutes};
use crate::learning::progress::{self, Actor, Completion, ProgressOutcome};

const MAX_ANALYTICS_DAYS: i64 = 365;

#[derive(Deserialize)]
pub struct StudentQuery {
    pub student_id: String,
}

#[derive(Deserialize)]
pub struct ProgressQuery {
    pub path_id: Option<String>,
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

#[derive(Deserialize)]
pub struct ProgressUpdate {
    pub progress_percentage: f64,
    #[serde(default)]
    pub time_spent_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ModuleComplete {
    #[serde(default)]
    pub final_time_spent: i64,
    pub difficulty_rating: Option<i64>,
    pub feedback: Option<String>,
    pub project_submission: Option<String>,
}

fn actor(user: &User, student: &Student, session: String) -> Actor {
    Actor {
        user_id: user.id.clone(),
        student_id: student.id.clone(),
        session_id: Some(session),
    }
}

/// Emails the parent when an update moved a module to completed.
async fn notify_completion(
    state: &AppState,
    user: &User,
    student: &Student,
    outcome: &ProgressOutcome,
) -> AppResult<()> {
    if !outcome.just_completed {
        return Ok(());
    }
    let path_progress = EnrollmentRepository::get(&state.db, &outcome.progress.student_path_id)
        .await?
        .map_or(0, |e| e.progress_percentage);

    state.email.send_in_background(
        user.email.clone(),
        templates::progress_update(
            &state.config.api.public_url,
            &user.first_name,
            &student.student_name,
            &outcome.module.title,
            path_progress,
        ),
    );
    Ok(())
}

fn outcome_json(outcome: &ProgressOutcome) -> Value {
    let mut body = json!(outcome.progress);
    if let Value::Object(map) = &mut body {
        map.insert(
            "achievements_earned".to_string(),
            json!(outcome.achievements.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()),
        );
    }
    body
}

pub async fn list_paths(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> AppResult<Json<Value>> {
    let paths: Vec<Value> = PathRepository::list_active_with_module_counts(&state.db)
        .await?
        .into_iter()
        .map(|(path, total_modules)| {
            json!({
                "id": path.id,
                "name": path.name,
                "slug": path.slug,
                "description": path.description,
                "icon": path.icon,
                "difficulty_level": path.difficulty_level,
                "estimated_hours": path.estimated_hours,
                "sort_order": path.sort_order,
                "total_modules": total_modules,
                "is_active": path.is_active,
            })
        })
        .collect();
    Ok(Json(Value::Array(paths)))
}

pub async fn path_detail(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path(path_id): Path<String>,
    Query(q): Query<StudentQuery>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &q.student_id, &user).await?;
    let path = PathRepository::get_active(&state.db, &path_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Learning path not found".to_string()))?;

    let modules = catalog::path_module_views(&state.db, &student.id, &path.id).await?;
    let student_progress = ProgressRepository::list_for_student(&state.db, &student.id, Some(&path.id)).await?;

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "learning_path_view", "learning", "Learning Path Viewed")
            .with_metadata(json!({ "path_id": path.id, "path_name": path.name, "student_id": student.id }))
            .with_session(Some(session)),
    );

    Ok(Json(json!({
        "path": {
            "id": path.id,
            "name": path.name,
            "slug": path.slug,
            "description": path.description,
            "icon": path.icon,
            "difficulty_level": path.difficulty_level,
            "estimated_hours": path.estimated_hours,
            "sort_order": path.sort_order,
            "total_modules": modules.len(),
            "is_active": path.is_active,
        },
        "modules": modules,
        "student_progress": student_progress,
    })))
}

pub async fn start_module(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path((module_id, student_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let progress = progress::start_module(&state.db, &actor(&user, &student, session), &module_id).await?;
    Ok(Json(json!(progress)))
}

pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path((module_id, student_id)): Path<(String, String)>,
    Json(req): Json<ProgressUpdate>,
) -> AppResult<Json<Value>> {
    if !req.progress_percentage.is_finite() {
        return Err(AppError::Validation("Progress percentage must be a number".to_string()));
    }
    check_minutes("time_spent_minutes", req.time_spent_minutes)?;
    let student = owned_student(&state.db, &student_id, &user).await?;

    let outcome = progress::update_progress(
        &state.db,
        &actor(&user, &student, session),
        &module_id,
        req.progress_percentage,
        req.time_spent_minutes,
        sanitize_opt(req.notes),
    )
    .await?;

    notify_completion(&state, &user, &student, &outcome).await?;
    Ok(Json(outcome_json(&outcome)))
}

pub async fn complete_module(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path((module_id, student_id)): Path<(String, String)>,
    Json(req): Json<ModuleComplete>,
) -> AppResult<Json<Value>> {
    if let Some(rating) = req.difficulty_rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation("Difficulty rating must be between 1 and 5".to_string()));
        }
    }
    check_minutes("final_time_spent", req.final_time_spent)?;
    let student = owned_student(&state.db, &student_id, &user).await?;

    let outcome = progress::complete_module(
        &state.db,
        &actor(&user, &student, session),
        &module_id,
        Completion {
            final_time_spent: req.final_time_spent,
            difficulty_rating: req.difficulty_rating,
            feedback: sanitize_opt(req.feedback),
            project_submission: sanitize_opt(req.project_submission),
        },
    )
    .await?;

    notify_completion(&state, &user, &student, &outcome).await?;
    Ok(Json(outcome_json(&outcome)))
}

pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
    Query(q): Query<ProgressQuery>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let rows = ProgressRepository::list_for_student(&state.db, &student.id, q.path_id.as_deref()).await?;
    Ok(Json(json!(rows)))
}

pub async fn module_detail(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path(module_id): Path<String>,
    Query(q): Query<StudentQuery>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &q.student_id, &user).await?;
    let module = ModuleRepository::get_active(&state.db, &module_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Module not found".to_string()))?;

    let is_locked = catalog::is_module_locked(&state.db, &student.id, &module).await?;

    track_content_engagement(
        state.db.clone(),
        Engagement {
            content_type: "module".to_string(),
            content_id: module.id.clone(),
            content_title: Some(module.title.clone()),
            student_id: student.id.clone(),
            session_id: Some(session),
            time_spent_minutes: 0,
            completion_percentage: 0.0,
            rating: None,
            feedback: None,
        },
    );

    Ok(Json(json!({
        "id": module.id,
        "path_id": module.path_id,
        "title": module.title,
        "description": module.description,
        "content": module.content,
        "icon": module.icon,
        "difficulty_level": module.difficulty_level,
        "estimated_hours": module.estimated_hours,
        "sort_order": module.sort_order,
        "learning_objectives": module.objectives_vec(),
        "topics": module.topics_vec(),
        "is_locked": is_locked,
        "is_active": module.is_active,
    })))
}

pub async fn assign_path(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((student_id, path_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let path = PathRepository::get_active(&state.db, &path_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Learning path not found".to_string()))?;

    let enrollment = EnrollmentRepository::assign(&state.db, &student.id, &path.id).await?;
    tracing::info!("Assigned path {} to student {}", path.slug, student.id);

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "learning_path_assigned", "learning", "Learning Path Assigned")
            .with_metadata(json!({
                "student_id": student.id,
                "path_id": path.id,
                "path_name": path.name,
            })),
    );

    Ok(Json(json!({
        "message": format!("Learning path '{}' assigned to {}", path.name, student.student_name),
        "student_path_id": enrollment.id,
        "path_name": path.name,
    })))
}

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
    Query(q): Query<AnalyticsQuery>,
) -> AppResult<Json<Value>> {
    if !(1..=MAX_ANALYTICS_DAYS).contains(&q.days) {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {}",
            MAX_ANALYTICS_DAYS
        )));
    }
    let student = owned_student(&state.db, &student_id, &user).await?;

    let now = Utc::now();
    let since = timestamp(now - Duration::days(q.days));
    let summary = ActivityRepository::learning_sessions_since(&state.db, Some(&student.id), &since).await?;

    Ok(Json(json!({
        "student_id": student.id,
        "period_days": q.days,
        "total_learning_sessions": summary.total_sessions,
        "total_learning_time_hours": round2(summary.total_minutes as f64 / 60.0),
        "average_session_minutes": round2(summary.average_session_minutes),
        "average_progress_percentage": round2(summary.average_progress),
        "modules_touched": summary.modules_touched,
        "generated_at": timestamp(now),
    })))
}
