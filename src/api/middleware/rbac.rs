use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use crate::auth::rbac::{has_permission, Permission};
use crate::db::models::user::User;
use crate::error::AppError;
use crate::api::AppState;
use super::auth::AuthUser;

/// Axum extractor that requires the caller to hold the `admin` role.
/// Returns 403 Forbidden for any other authenticated caller.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if has_permission(&user.role, &Permission::ViewAdminDashboard) {
            Ok(AdminUser(user))
        } else {
            Err(AppError::Forbidden("Admin privileges required".to_string()))
        }
    }
}
