use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::convert::Infallible;
use std::sync::Arc;
use crate::db::models::user::{User, UserRepository};
use crate::error::AppError;
use crate::api::AppState;

/// Axum extractor that validates a Bearer JWT token and loads the active account.
/// Add this as a handler parameter to require authentication.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthFailed)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::AuthFailed)?;

        let claims = crate::auth::jwt::verify(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::AuthFailed)?;

        // Deactivated accounts lose access immediately, even with an unexpired token.
        let user = UserRepository::find_active_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::AuthFailed)?;

        Ok(AuthUser(user))
    }
}

/// Client IP of the TCP peer.
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(super::peer_ip(&parts.extensions)))
    }
}
