use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use super::headers::SessionId;
use crate::api::AppState;
use crate::db::analytics::{log_error, record_system_metric, ErrorEntry};

/// Logs every request, records its response time and turns 5xx responses into error-log rows.
pub async fn log_requests(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ip = super::peer_ip(req.extensions());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let session = req.extensions().get::<SessionId>().map(|s| s.0.clone());

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = started.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    state
        .metrics
        .record(status.as_u16(), elapsed.as_millis().try_into().unwrap_or(u64::MAX));

    if status.is_client_error() || status.is_server_error() {
        tracing::warn!("{} {} -> {} in {:.1}ms from {}", method, path, status.as_u16(), elapsed_ms, ip);
    } else {
        tracing::info!("{} {} -> {} in {:.1}ms from {}", method, path, status.as_u16(), elapsed_ms, ip);
    }

    record_system_metric(
        state.db.clone(),
        "response_time",
        "performance",
        elapsed_ms,
        Some("ms"),
        Some(path.clone()),
        Some(method.clone()),
        Some(status.as_u16()),
    );

    if status.is_server_error() {
        log_error(
            state.db.clone(),
            ErrorEntry {
                error_type: "http_error".to_string(),
                category: "request_processing".to_string(),
                severity: "high",
                message: format!("{} {} returned {}", method, path, status),
                user_id: None,
                session_id: session,
                endpoint: Some(path),
                method: Some(method),
                user_agent,
                ip_address: Some(ip),
            },
        );
    }

    response
}
