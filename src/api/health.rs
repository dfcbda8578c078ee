//! Load balancer and deployment endpoints

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::warn;

use crate::api::reputation::ApiState;

/// GET /__lbheartbeat__ - Process is up
pub async fn lbheartbeat() -> StatusCode {
    StatusCode::OK
}

/// GET /__heartbeat__ - Process is up and the store answers
pub async fn heartbeat(State(state): State<ApiState>) -> Response {
    match state.service.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(error = %e, "Heartbeat failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// GET /__version__ - Build metadata written at deploy time
pub async fn version(State(state): State<ApiState>) -> Response {
    match tokio::fs::read_to_string(&state.version_file).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(path = %state.version_file.display(), error = %e, "Version file unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/__lbheartbeat__", get(lbheartbeat))
        .route("/__heartbeat__", get(heartbeat))
        .route("/__version__", get(version))
        .with_state(state)
}
