use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::AppState;
use crate::error::AppError;

/// Per-endpoint request budget, keyed by bucket name and client IP.
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub bucket: &'static str,
    pub requests: usize,
    pub window_secs: u64,
}

impl Limit {
    pub const fn new(bucket: &'static str, requests: usize, window_secs: u64) -> Self {
        Self { bucket, requests, window_secs }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize, reset_secs: u64 },
    Limited { retry_after_secs: u64 },
}

/// Sliding-window limiter: each key keeps the instants of its accepted
/// requests inside the current window.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, max: usize, window: Duration) -> Decision {
        self.check_at(key, max, window, Instant::now())
    }

    pub fn check_at(&self, key: &str, max: usize, window: Duration, now: Instant) -> Decision {
        let mut hits = self.windows.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= window)
        {
            hits.pop_front();
        }

        if hits.len() >= max {
            let oldest = hits.front().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.saturating_duration_since(oldest));
            return Decision::Limited { retry_after_secs: ceil_secs(wait) };
        }

        hits.push_back(now);
        let oldest = hits.front().copied().unwrap_or(now);
        let reset = window.saturating_sub(now.saturating_duration_since(oldest));
        Decision::Allowed {
            remaining: max - hits.len(),
            reset_secs: ceil_secs(reset),
        }
    }

    /// Drops keys whose windows have fully expired.
    pub fn prune(&self, window: Duration) {
        let now = Instant::now();
        self.windows.retain(|_, hits| {
            hits.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < window)
        });
    }
}

/// Route layer enforcing one [`Limit`] for the peer IP.
pub async fn enforce(
    State((state, limit)): State<(Arc<AppState>, Limit)>,
    req: Request,
    next: Next,
) -> Response {
    let ip = super::peer_ip(req.extensions());
    let key = format!("{}:{}", limit.bucket, ip);
    match state
        .rate_limiter
        .check(&key, limit.requests, Duration::from_secs(limit.window_secs))
    {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Limited { retry_after_secs } => {
            tracing::warn!("Rate limit hit on {} for {}", limit.bucket, ip);
            AppError::TooManyRequests { retry_after_secs }.into_response()
        }
    }
}

/// Global per-IP budget with X-RateLimit-* response headers.
pub async fn global(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let cfg = &state.config.rate_limit;
    let ip = super::peer_ip(req.extensions());

    if cfg.exempt_loopback
        && ip.parse::<std::net::IpAddr>().is_ok_and(|addr| addr.is_loopback())
    {
        return next.run(req).await;
    }

    let window = Duration::from_secs(cfg.global_window_secs);
    match state
        .rate_limiter
        .check(&format!("global:{}", ip), cfg.global_requests, window)
    {
        Decision::Allowed { remaining, reset_secs } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(cfg.global_requests));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset_secs));
            response
        }
        Decision::Limited { retry_after_secs } => {
            tracing::warn!("Global rate limit exceeded for {}", ip);
            let mut response = AppError::TooManyRequests { retry_after_secs }.into_response();
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(cfg.global_requests));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
            headers.insert("x-ratelimit-reset", HeaderValue::from(retry_after_secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();
        assert_eq!(
            limiter.check_at("login:1.2.3.4", 2, MINUTE, t0),
            Decision::Allowed { remaining: 1, reset_secs: 60 }
        );
        assert!(matches!(
            limiter.check_at("login:1.2.3.4", 2, MINUTE, t0),
            Decision::Allowed { remaining: 0, .. }
        ));
        assert_eq!(
            limiter.check_at("login:1.2.3.4", 2, MINUTE, t0 + Duration::from_secs(15)),
            Decision::Limited { retry_after_secs: 45 }
        );
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();
        limiter.check_at("k", 1, MINUTE, t0);
        assert!(matches!(
            limiter.check_at("k", 1, MINUTE, t0 + Duration::from_secs(59)),
            Decision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at("k", 1, MINUTE, t0 + MINUTE),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();
        limiter.check_at("login:a", 1, MINUTE, t0);
        assert!(matches!(limiter.check_at("login:b", 1, MINUTE, t0), Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("login:a", 1, MINUTE, t0), Decision::Limited { .. }));
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();
        limiter.check_at("k", 1, MINUTE, t0);
        assert_eq!(
            limiter.check_at("k", 1, MINUTE, t0 + Duration::from_millis(59_999)),
            Decision::Limited { retry_after_secs: 1 }
        );
    }
}
