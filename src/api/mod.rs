//! HTTP surface of the reputation service
//!
//! Provides:
//! - Reputation API (lookup, create, update, delete, violations)
//! - Heartbeat and version endpoints
//! - Middleware (body limits, security headers, request logging)
//! - A client for the API

pub mod client;
pub mod health;
pub mod middleware;
pub mod reputation;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::trace::TraceLayer;

pub use client::{ClientConfig, ReputationClient};
pub use middleware::{
    MiddlewareConfig, body_size_middleware, logging_middleware, security_headers_middleware,
};
pub use reputation::{ApiState, ViolationsResponse, create_router};

/// Build the complete application: every route plus the middleware stack
pub fn build_app(state: ApiState, config: MiddlewareConfig) -> Router {
    Router::new()
        .merge(health::create_router(state.clone()))
        .merge(create_router(state))
        // Apply middleware layers (order matters!)
        .layer(DefaultBodyLimit::max(config.max_request_size))
        .layer(axum::middleware::from_fn_with_state(
            config.clone(),
            body_size_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            config,
            logging_middleware,
        ))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}
