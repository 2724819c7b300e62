use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use crate::api::AppState;
use crate::error::AppResult;

pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "CIFIX LEARN API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.api.environment,
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(json!({
        "status": "healthy",
        "database": "connected",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": crate::db::now(),
    })))
}
