use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::owned_student;
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::headers::SessionId;
use crate::api::validators::{sanitize_opt, AgeValidator, Validator};
use crate::api::AppState;
use crate::db::analytics::{track_student_activity, track_user_action, UserAction};
use crate::db::models::achievement::AchievementRepository;
use crate::db::models::learning::{EnrollmentRepository, LearningPath, PathRepository, ProgressRepository};
use crate::db::models::student::{StudentRepository, UpdateStudent};
use crate::error::{AppError, AppResult};
use crate::learning::{achievements, catalog};

const RECENT_ACHIEVEMENTS: i64 = 5;

pub(crate) fn path_summary(path: &LearningPath, progress_percentage: i64) -> Value {
    json!({
        "id": path.id,
        "name": path.name,
        "slug": path.slug,
        "description": path.description,
        "icon": path.icon,
        "difficulty_level": path.difficulty_level,
        "estimated_hours": path.estimated_hours,
        "progress_percentage": progress_percentage,
        "is_active": path.is_active,
    })
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "dashboard_view", "navigation", "Student Dashboard Accessed")
            .with_metadata(json!({ "student_id": student.id })),
    );

    let enrollment = EnrollmentRepository::current(&state.db, &student.id).await?;
    let current_path = match &enrollment {
        Some(e) => PathRepository::get(&state.db, &e.path_id).await?,
        None => None,
    };

    let module_progress = match &enrollment {
        Some(e) => catalog::path_module_views(&state.db, &student.id, &e.path_id).await?,
        None => Vec::new(),
    };

    let completed_modules = ProgressRepository::count_completed(&state.db, &student.id).await?;
    let total_modules = EnrollmentRepository::total_modules(&state.db, &student.id).await?;
    let total_minutes = ProgressRepository::total_minutes(&state.db, &student.id).await?;
    let achievements_count = AchievementRepository::count_for_student(&state.db, &student.id).await?;
    let current_streak = achievements::student_streak(&state.db, &student.id).await?;
    let total_courses = EnrollmentRepository::count_active(&state.db, &student.id).await?;
    let recent_achievements =
        AchievementRepository::list_for_student(&state.db, &student.id, Some(RECENT_ACHIEVEMENTS)).await?;

    let available_paths: Vec<Value> = PathRepository::list_active(&state.db)
        .await?
        .iter()
        .map(|p| {
            let progress = enrollment
                .as_ref()
                .filter(|e| e.path_id == p.id)
                .map_or(0, |e| e.progress_percentage);
            path_summary(p, progress)
        })
        .collect();

    let current_path = match (&current_path, &enrollment) {
        (Some(p), Some(e)) => path_summary(p, e.progress_percentage),
        _ => Value::Null,
    };

    Ok(Json(json!({
        "student": student,
        "stats": {
            "total_courses": total_courses,
            "completed_modules": completed_modules,
            "total_modules": total_modules,
            "hours_spent": total_minutes / 60,
            "achievements_count": achievements_count,
            "current_streak": current_streak,
        },
        "current_path": current_path,
        "module_progress": module_progress,
        "recent_achievements": recent_achievements,
        "available_paths": available_paths,
    })))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
    Json(req): Json<UpdateStudent>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;

    if let Some(age) = req.age {
        AgeValidator.validate(&age)?;
    }
    let req = UpdateStudent {
        student_name: sanitize_opt(req.student_name),
        age: req.age,
        grade_level: sanitize_opt(req.grade_level),
        school_name: sanitize_opt(req.school_name),
        emergency_contact: sanitize_opt(req.emergency_contact),
        medical_conditions: sanitize_opt(req.medical_conditions),
        dietary_restrictions: sanitize_opt(req.dietary_restrictions),
    };
    if req.student_name.as_deref().is_some_and(str::is_empty) {
        return Err(AppError::Validation("Student name cannot be empty".to_string()));
    }

    let updated = StudentRepository::update(&state.db, &student.id, &req).await?;

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "profile_update", "profile", "Student Profile Updated")
            .with_metadata(json!({ "student_id": student.id, "fields_updated": req.field_names() })),
    );

    Ok(Json(json!(updated)))
}

pub async fn learning_paths(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> AppResult<Json<Value>> {
    let paths: Vec<Value> = PathRepository::list_active(&state.db)
        .await?
        .iter()
        .map(|p| path_summary(p, 0))
        .collect();
    Ok(Json(Value::Array(paths)))
}

pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(student_id): Path<String>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    let earned = AchievementRepository::list_for_student(&state.db, &student.id, None).await?;
    Ok(Json(json!(earned)))
}

pub async fn track_activity(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    SessionId(session): SessionId,
    Path(student_id): Path<String>,
    Json(data): Json<Value>,
) -> AppResult<Json<Value>> {
    let student = owned_student(&state.db, &student_id, &user).await?;
    if !data.is_object() {
        return Err(AppError::Validation("Activity data must be a JSON object".to_string()));
    }

    let activity_type = data
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("interaction")
        .to_string();

    track_student_activity(
        state.db.clone(),
        user.id.clone(),
        student.id,
        activity_type,
        data,
        Some(session),
    );

    Ok(Json(json!({ "message": "Activity tracked successfully" })))
}
