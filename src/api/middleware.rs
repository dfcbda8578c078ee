//! HTTP middleware for the reputation API
//!
//! Provides:
//! - Request body size limits
//! - Response security headers
//! - Request logging with a slow-request warning

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;

/// Settings consumed by the middleware layers
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Enable request logging
    pub log_requests: bool,
    /// Requests slower than this are logged at warn
    pub slow_request: Duration,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024, // 1MB
            log_requests: true,
            slow_request: Duration::from_millis(10),
        }
    }
}

impl From<&ServiceConfig> for MiddlewareConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            max_request_size: config.http.max_request_size,
            log_requests: config.logging.log_requests,
            slow_request: Duration::from_millis(config.logging.slow_request_ms),
        }
    }
}

/// Extract client IP from request, handling proxies
fn get_client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
    {
        return ip.trim().to_string();
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Security headers middleware. The API serves JSON only, so nothing may be
/// framed or loaded from a response.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.remove("Server");

    response
}

/// Request logging middleware
pub async fn logging_middleware(
    State(config): State<MiddlewareConfig>,
    request: Request,
    next: Next,
) -> Response {
    if !config.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    // ConnectInfo is absent when the router is driven without a listener
    let addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = get_client_ip(request.headers(), addr.as_ref());

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Request failed"
        );
    } else if duration > config.slow_request {
        warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Slow request"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            client_ip = %client_ip,
            "Request completed"
        );
    }

    response
}

/// Request body size validation middleware
pub async fn body_size_middleware(
    State(config): State<MiddlewareConfig>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(content_length) = headers.get("content-length")
        && let Ok(length_str) = content_length.to_str()
        && let Ok(length) = length_str.parse::<usize>()
        && length > config.max_request_size
    {
        warn!(
            "Request body too large: {} bytes (max: {})",
            length, config.max_request_size
        );
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let addr: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(get_client_ip(&headers, Some(&addr)), "10.0.0.1");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );
        assert_eq!(get_client_ip(&headers, Some(&addr)), "198.51.100.7");
        assert_eq!(get_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_config_from_service_config() {
        let mut service = ServiceConfig::default();
        service.logging.slow_request_ms = 250;
        service.http.max_request_size = 4096;

        let config = MiddlewareConfig::from(&service);
        assert_eq!(config.slow_request, Duration::from_millis(250));
        assert_eq!(config.max_request_size, 4096);
    }
}
