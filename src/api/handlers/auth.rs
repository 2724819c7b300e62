use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::middleware::auth::{AuthUser, ClientIp};
use crate::api::validators::{sanitize, sanitize_opt, AgeValidator, EmailValidator, Validator};
use crate::api::AppState;
use crate::auth::{jwt, password, tokens};
use crate::db::analytics::{track_user_action, UserAction};
use crate::db::models::student::{NewStudent, StudentRepository};
use crate::db::models::user::{NewUser, User, UserRepository};
use crate::db::{now, timestamp};
use crate::email::templates;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct UserRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub user: UserRegistration,
    pub student: NewStudent,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn token_response(state: &AppState, user: &User) -> AppResult<Value> {
    let token = jwt::generate(
        &user.id,
        &user.email,
        &user.role,
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_expiry_hours,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(json!({
        "access_token": token,
        "token_type": "bearer",
        "user_id": user.id,
        "email": user.email,
        "expires_in": state.config.auth.jwt_expiry_hours * 3600,
    }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let auth_cfg = &state.config.auth;

    EmailValidator.validate(req.user.email.as_str())?;
    let strength = password::check_strength(
        &req.user.password,
        auth_cfg.password_min_length,
        auth_cfg.require_strong_passwords,
    );
    if !strength.is_valid {
        return Err(AppError::WeakPassword(strength.feedback));
    }
    AgeValidator.validate(&req.student.age)?;

    let email = req.user.email.trim().to_lowercase();
    if UserRepository::email_exists(&state.db, &email).await? {
        return Err(AppError::Validation("Email address is already registered".to_string()));
    }

    let first_name = sanitize(&req.user.first_name);
    let last_name = sanitize(&req.user.last_name);
    let student_name = sanitize(&req.student.student_name);
    if first_name.is_empty() || last_name.is_empty() || student_name.is_empty() {
        return Err(AppError::Validation("Names cannot be empty".to_string()));
    }

    let verification_token = tokens::verification_token();
    let password_hash = password::hash(&req.user.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        first_name,
        last_name,
        phone: sanitize_opt(req.user.phone),
        verification_token: verification_token.clone(),
        verification_expires: timestamp(Utc::now() + Duration::hours(auth_cfg.verification_expiry_hours)),
    };
    let new_student = NewStudent {
        student_name,
        age: req.student.age,
        grade_level: sanitize_opt(req.student.grade_level),
        school_name: sanitize_opt(req.student.school_name),
        parent_name: sanitize_opt(req.student.parent_name),
        emergency_contact: sanitize_opt(req.student.emergency_contact),
        medical_conditions: sanitize_opt(req.student.medical_conditions),
        dietary_restrictions: sanitize_opt(req.student.dietary_restrictions),
    };

    let mut tx = state.db.begin().await?;
    let user = UserRepository::insert(&mut *tx, &new_user).await?;
    let student = StudentRepository::insert(&mut *tx, &user.id, &new_student).await?;
    tx.commit().await?;

    tracing::info!("Registered {} with student {}", user.email, student.id);

    state.email.send_in_background(
        user.email.clone(),
        templates::verification(
            &state.config.api.public_url,
            &user.first_name,
            &verification_token,
            auth_cfg.verification_expiry_hours,
        ),
    );

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "user_register", "auth", "User Registration")
            .with_metadata(json!({ "student_id": student.id, "ip": ip })),
    );

    Ok((StatusCode::CREATED, Json(token_response(&state, &user)?)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let auth_cfg = &state.config.auth;
    let email = req.email.trim().to_lowercase();

    let user = UserRepository::find_active_by_email(&state.db, &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if user.is_locked(&now()) {
        tracing::warn!("Login attempt on locked account {} from {}", user.email, ip);
        return Err(AppError::Locked(
            "Account is temporarily locked due to too many failed login attempts".to_string(),
        ));
    }

    if !password::verify(&req.password, &user.password_hash) {
        let lock_until = timestamp(Utc::now() + Duration::minutes(auth_cfg.lockout_minutes));
        let updated = UserRepository::record_failed_login(
            &state.db,
            &user.id,
            auth_cfg.max_login_attempts,
            &lock_until,
        )
        .await?;
        if updated.locked_until.is_some() {
            tracing::warn!("Account {} locked after {} failed logins", user.email, updated.failed_login_attempts);
        }
        return Err(AppError::InvalidCredentials);
    }

    UserRepository::record_successful_login(&state.db, &user.id).await?;

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "user_login", "auth", "User Login")
            .with_metadata(json!({ "ip": ip })),
    );

    Ok(Json(token_response(&state, &user)?))
}

pub async fn me(AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "phone": user.phone,
        "email_verified": user.email_verified,
        "is_admin": user.is_admin(),
        "created_at": user.created_at,
    })))
}

pub async fn students(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    let students = StudentRepository::list_active_for_user(&state.db, &user.id).await?;
    let data: Vec<Value> = students
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "student_name": s.student_name,
                "age": s.age,
                "grade_level": s.grade_level,
                "school_name": s.school_name,
            })
        })
        .collect();
    Ok(Json(Value::Array(data)))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<Value>> {
    let user = UserRepository::find_by_verification_token(&state.db, &token)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired verification token".to_string()))?;

    UserRepository::mark_email_verified(&state.db, &user.id).await?;

    if let Some(student) = StudentRepository::list_active_for_user(&state.db, &user.id)
        .await?
        .into_iter()
        .next()
    {
        state.email.send_in_background(
            user.email.clone(),
            templates::welcome(&state.config.api.public_url, &user.first_name, &student.student_name),
        );
    }

    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "email_verified", "auth", "Email Verified"),
    );

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    // JWT is stateless; client just discards the token.
    track_user_action(
        state.db.clone(),
        UserAction::new(&user.id, "user_logout", "auth", "User Logout"),
    );
    Ok(Json(json!({ "message": "Logged out successfully" })))
}
