pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod rbac;
pub mod request_log;

use axum::extract::ConnectInfo;
use axum::http::Extensions;
use std::net::SocketAddr;

/// Peer IP from the connection, or "unknown" when served without connect info.
pub fn peer_ip(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
