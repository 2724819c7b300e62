use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::round2;
use crate::api::middleware::rbac::AdminUser;
use crate::api::AppState;
use crate::auth::rbac::{has_permission, Permission, Role};
use crate::db::analytics::{system_health, track_user_action, UserAction};
use crate::db::models::analytics::{ActivityRepository, ErrorFilter, ErrorLogRepository};
use crate::db::models::assessment::AssessmentRepository;
use crate::db::models::student::StudentRepository;
use crate::db::models::user::{User, UserRepository};
use crate::db::timestamp;
use crate::error::{AppError, AppResult};

const MAX_PAGE: i64 = 100;
const MAX_ERROR_HOURS: i64 = 168;
const MAX_SUMMARY_DAYS: i64 = 365;

fn default_limit() -> i64 {
    50
}

fn default_hours() -> i64 {
    24
}

fn default_days() -> i64 {
    30
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct ErrorQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub severity: Option<String>,
    pub resolved: Option<bool>,
    #[serde(default = "default_hours")]
    pub hours: i64,
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn check_page(skip: i64, limit: i64) -> AppResult<()> {
    if skip < 0 {
        return Err(AppError::Validation("skip must not be negative".to_string()));
    }
    if !(1..=MAX_PAGE).contains(&limit) {
        return Err(AppError::Validation(format!("limit must be between 1 and {}", MAX_PAGE)));
    }
    Ok(())
}

fn require(admin: &User, permission: Permission) -> AppResult<()> {
    if has_permission(&admin.role, &permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin privileges required".to_string()))
    }
}

/// Search terms are matched as substrings; blank input means no filter.
fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<Value>> {
    let day_ago = timestamp(Utc::now() - Duration::hours(24));

    let total_users = ActivityRepository::count_users(&state.db).await?;
    let active_users_24h = ActivityRepository::active_users_since(&state.db, &day_ago).await?;
    let total_students = ActivityRepository::count_students(&state.db).await?;
    let total_assessments = AssessmentRepository::count_completed(&state.db).await?;
    let completed_modules = ActivityRepository::count_completed_modules(&state.db).await?;
    let total_minutes = ActivityRepository::total_learning_minutes(&state.db).await?;
    let health = system_health(&state.db).await?;

    Ok(Json(json!({
        "total_users": total_users,
        "active_users_24h": active_users_24h,
        "total_students": total_students,
        "total_assessments": total_assessments,
        "completed_modules": completed_modules,
        "total_learning_hours": (total_minutes as f64 / 60.0 * 10.0).round() / 10.0,
        "system_health": health.system_status,
        "errors_24h": health.errors_last_24h,
        "critical_errors": health.critical_errors_unresolved,
    })))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    require(&admin, Permission::ManageUsers)?;
    check_page(q.skip, q.limit)?;
    let users = UserRepository::list_summaries(&state.db, search_term(&q.search), q.skip, q.limit).await?;
    Ok(Json(json!(users)))
}

pub async fn list_students(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    check_page(q.skip, q.limit)?;
    let students =
        StudentRepository::list_summaries(&state.db, search_term(&q.search), q.skip, q.limit).await?;
    Ok(Json(json!(students)))
}

pub async fn list_errors(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(q): Query<ErrorQuery>,
) -> AppResult<Json<Value>> {
    check_page(q.skip, q.limit)?;
    if !(1..=MAX_ERROR_HOURS).contains(&q.hours) {
        return Err(AppError::Validation(format!("hours must be between 1 and {}", MAX_ERROR_HOURS)));
    }

    let filter = ErrorFilter {
        severity: q.severity.as_deref(),
        resolved: q.resolved,
        since: timestamp(Utc::now() - Duration::hours(q.hours)),
        skip: q.skip,
        limit: q.limit,
    };
    let errors = ErrorLogRepository::list(&state.db, &filter).await?;

    let rows: Vec<Value> = errors
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "error_type": e.error_type,
                "error_category": e.error_category,
                "severity": e.severity,
                "error_message": e.error_message,
                "occurred_at": e.occurred_at,
                "user_id": e.user_id,
                "endpoint": e.endpoint,
                "resolved": e.resolved,
            })
        })
        .collect();
    Ok(Json(Value::Array(rows)))
}

pub async fn resolve_error(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(error_id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&admin, Permission::ResolveErrors)?;
    if !ErrorLogRepository::resolve(&state.db, &error_id, &admin.id).await? {
        return Err(AppError::NotFound("Error not found".to_string()));
    }

    track_user_action(
        state.db.clone(),
        UserAction::new(&admin.id, "error_resolved", "admin", "Error Marked Resolved")
            .with_metadata(json!({ "error_id": error_id })),
    );

    Ok(Json(json!({ "message": "Error marked as resolved" })))
}

pub async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(q): Query<SummaryQuery>,
) -> AppResult<Json<Value>> {
    if !(1..=MAX_SUMMARY_DAYS).contains(&q.days) {
        return Err(AppError::Validation(format!("days must be between 1 and {}", MAX_SUMMARY_DAYS)));
    }
    let now = Utc::now();
    let since = timestamp(now - Duration::days(q.days));

    let activity_trends = ActivityRepository::daily_activity(&state.db, &since).await?;
    let popular_features = ActivityRepository::popular_features(&state.db, &since).await?;
    let sessions = ActivityRepository::learning_sessions_since(&state.db, None, &since).await?;

    Ok(Json(json!({
        "period_days": q.days,
        "activity_trends": activity_trends,
        "popular_features": popular_features,
        "learning_overview": {
            "total_sessions": sessions.total_sessions,
            "modules_touched": sessions.modules_touched,
            "average_progress_percentage": round2(sessions.average_progress),
            "average_session_minutes": round2(sessions.average_session_minutes),
            "total_learning_hours": round2(sessions.total_minutes as f64 / 60.0),
        },
        "generated_at": timestamp(now),
    })))
}

pub async fn health(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<Value>> {
    let health = system_health(&state.db).await?;
    let mut body = json!(health);
    if let Value::Object(map) = &mut body {
        map.insert("server_version".to_string(), json!(env!("CARGO_PKG_VERSION")));
        map.insert("environment".to_string(), json!(state.config.api.environment));
    }
    Ok(Json(body))
}

pub async fn toggle_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&admin, Permission::ManageUsers)?;
    if user_id == admin.id {
        return Err(AppError::Validation("Cannot modify your own admin status".to_string()));
    }
    let target = UserRepository::find_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let new_role = if target.is_admin() { Role::Parent } else { Role::Admin };
    UserRepository::set_role(&state.db, &target.id, new_role).await?;
    let is_admin = new_role == Role::Admin;

    tracing::warn!(
        "Admin {} set role of {} to {}",
        admin.email,
        target.email,
        new_role
    );
    track_user_action(
        state.db.clone(),
        UserAction::new(&admin.id, "admin_role_changed", "admin", "User Admin Status Changed")
            .with_metadata(json!({ "target_user_id": target.id, "is_admin": is_admin })),
    );

    Ok(Json(json!({
        "message": format!("User admin status {}", if is_admin { "granted" } else { "revoked" }),
        "user_email": target.email,
        "is_admin": is_admin,
    })))
}

pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    require(&admin, Permission::ManageUsers)?;
    if user_id == admin.id {
        return Err(AppError::Validation("Cannot deactivate your own account".to_string()));
    }
    let target = UserRepository::find_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    UserRepository::deactivate_with_students(&state.db, &target.id).await?;

    tracing::warn!("Admin {} deactivated account {}", admin.email, target.email);
    track_user_action(
        state.db.clone(),
        UserAction::new(&admin.id, "user_deactivated", "admin", "User Account Deactivated")
            .with_metadata(json!({ "target_user_id": target.id })),
    );

    Ok(Json(json!({
        "message": "User account deactivated",
        "user_email": target.email,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_page_bounds() {
        assert!(check_page(0, 50).is_ok());
        assert!(check_page(0, 100).is_ok());
        assert!(check_page(0, 0).is_err());
        assert!(check_page(0, 101).is_err());
        assert!(check_page(-1, 10).is_err());
    }

    #[test]
    fn test_search_term_ignores_blank() {
        assert_eq!(search_term(&None), None);
        assert_eq!(search_term(&Some("   ".to_string())), None);
        assert_eq!(search_term(&Some(" ann ".to_string())), Some("ann"));
    }
}
