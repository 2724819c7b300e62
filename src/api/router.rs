use axum::{
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::middleware::rate_limit::{self, Limit};
use super::AppState;

/// Attaches a per-endpoint sliding-window limit to a route.
fn limited(
    state: &Arc<AppState>,
    bucket: &'static str,
    requests: usize,
    window_secs: u64,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    let limit = Limit::new(bucket, requests, window_secs);
    route.route_layer(axum::middleware::from_fn_with_state(
        (state.clone(), limit),
        rate_limit::enforce,
    ))
}

pub fn routes(state: Arc<AppState>) -> Router {
    let s = &state;
    Router::new()
        // Health and metrics (public)
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .nest("/api/auth", auth_routes(s))
        .nest("/api/students", student_routes(s))
        .nest("/api/assessments", assessment_routes(s))
        .nest("/api/learning", learning_routes(s))
        .nest("/api/admin", admin_routes())
        .with_state(state)
}

fn auth_routes(s: &Arc<AppState>) -> Router<Arc<AppState>> {
    use handlers::auth;
    Router::new()
        .route("/register", limited(s, "auth_register", 3, 300, post(auth::register)))
        .route("/login", limited(s, "auth_login", 5, 300, post(auth::login)))
        .route("/me", limited(s, "auth_me", 20, 60, get(auth::me)))
        .route("/students", limited(s, "auth_students", 20, 60, get(auth::students)))
        .route(
            "/verify-email/{token}",
            limited(s, "auth_verify_email", 10, 60, post(auth::verify_email)),
        )
        .route("/logout", limited(s, "auth_logout", 20, 60, post(auth::logout)))
}

fn student_routes(s: &Arc<AppState>) -> Router<Arc<AppState>> {
    use handlers::students;
    Router::new()
        .route(
            "/dashboard/{student_id}",
            limited(s, "student_dashboard", 30, 60, get(students::dashboard)),
        )
        .route(
            "/profile/{student_id}",
            limited(s, "student_profile", 10, 60, put(students::update_profile)),
        )
        .route(
            "/learning-paths",
            limited(s, "student_learning_paths", 50, 60, get(students::learning_paths)),
        )
        .route(
            "/achievements/{student_id}",
            limited(s, "student_achievements", 30, 60, get(students::list_achievements)),
        )
        .route(
            "/activity/{student_id}",
            limited(s, "student_activity", 100, 60, post(students::track_activity)),
        )
}

fn assessment_routes(s: &Arc<AppState>) -> Router<Arc<AppState>> {
    use handlers::assessments;
    Router::new()
        .route("/start", limited(s, "assessment_start", 5, 300, post(assessments::start)))
        .route("/complete", limited(s, "assessment_complete", 10, 300, post(assessments::complete)))
        .route(
            "/results/{student_id}",
            limited(s, "assessment_results", 20, 60, get(assessments::results)),
        )
        .route(
            "/recommendations/{student_id}",
            limited(s, "assessment_recommendations", 10, 60, get(assessments::recommendations)),
        )
        .route(
            "/retake/{student_id}",
            limited(s, "assessment_retake", 2, 3600, post(assessments::retake)),
        )
        .route(
            "/analytics/{student_id}",
            limited(s, "assessment_analytics", 10, 60, get(assessments::analytics)),
        )
}

fn learning_routes(s: &Arc<AppState>) -> Router<Arc<AppState>> {
    use handlers::learning;
    Router::new()
        .route("/paths", limited(s, "learning_paths", 50, 60, get(learning::list_paths)))
        .route(
            "/paths/{path_id}",
            limited(s, "learning_path_detail", 30, 60, get(learning::path_detail)),
        )
        .route(
            "/modules/{module_id}",
            limited(s, "learning_module_detail", 50, 60, get(learning::module_detail)),
        )
        .route(
            "/modules/{module_id}/start/{student_id}",
            limited(s, "learning_module_start", 20, 60, post(learning::start_module)),
        )
        .route(
            "/modules/{module_id}/progress/{student_id}",
            limited(s, "learning_module_progress", 100, 60, put(learning::update_progress)),
        )
        .route(
            "/modules/{module_id}/complete/{student_id}",
            limited(s, "learning_module_complete", 20, 60, post(learning::complete_module)),
        )
        .route(
            "/progress/{student_id}",
            limited(s, "learning_progress", 30, 60, get(learning::list_progress)),
        )
        .route(
            "/assign-path/{student_id}/{path_id}",
            limited(s, "learning_assign_path", 5, 300, post(learning::assign_path)),
        )
        .route(
            "/analytics/{student_id}",
            limited(s, "learning_analytics", 10, 60, get(learning::analytics)),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    use handlers::admin;
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/students", get(admin::list_students))
        .route("/errors", get(admin::list_errors))
        .route("/errors/{error_id}/resolve", patch(admin::resolve_error))
        .route("/analytics/summary", get(admin::analytics_summary))
        .route("/system/health", get(admin::health))
        .route("/users/{user_id}/toggle-admin", post(admin::toggle_admin))
        .route("/users/{user_id}/deactivate", delete(admin::deactivate_user))
}
