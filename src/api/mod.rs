use anyhow::Result;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use std::sync::Arc;
use std::net::SocketAddr;
use std::time::Duration;
use crate::config::{Config, RateLimitConfig};
use crate::db::DbPool;
use crate::email::EmailClient;
use crate::metrics::HttpMetrics;
use self::middleware::rate_limit::RateLimiter;

pub mod router;
pub mod middleware;
pub mod handlers;
pub mod validators;

/// Longest per-endpoint rate-limit window.
const MAX_ROUTE_WINDOW: Duration = Duration::from_secs(3600);

/// Age after which limiter history can be dropped: the longest of the
/// per-endpoint windows and the configured global window.
fn prune_window(cfg: &RateLimitConfig) -> Duration {
    MAX_ROUTE_WINDOW.max(Duration::from_secs(cfg.global_window_secs))
}

pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub email: EmailClient,
    pub metrics: Arc<HttpMetrics>,
}

impl AppState {
    pub fn new(cfg: Config, db: DbPool) -> Result<Self> {
        let email = EmailClient::new(&cfg.email)?;
        Ok(Self {
            db,
            config: cfg,
            rate_limiter: RateLimiter::new(),
            email,
            metrics: Arc::new(HttpMetrics::default()),
        })
    }
}

pub async fn serve(cfg: Config, db: DbPool) -> Result<()> {
    let bind_addr = format!("{}:{}", cfg.api.bind, cfg.api.port);
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let state = Arc::new(AppState::new(cfg, db)?);

    let pruner = state.clone();
    let window = prune_window(&state.config.rate_limit);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            pruner.rate_limiter.prune(window);
        }
    });

    let app = build_app(state, cors);

    // Peer addresses feed rate limiting and request logs.
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("CIFIX LEARN API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    ).await?;
    Ok(())
}

pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::headers::SESSION_HEADER),
        ])
        .allow_credentials(true)
}

pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(router::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit::global))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::request_log::log_requests))
        .layer(axum::middleware::from_fn_with_state(state, middleware::headers::security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_window_covers_long_global_window() {
        let mut cfg = RateLimitConfig::default();
        assert_eq!(prune_window(&cfg), MAX_ROUTE_WINDOW);

        cfg.global_window_secs = 60;
        assert_eq!(prune_window(&cfg), MAX_ROUTE_WINDOW);

        cfg.global_window_secs = 86_400;
        assert_eq!(prune_window(&cfg), Duration::from_secs(86_400));
    }
}
