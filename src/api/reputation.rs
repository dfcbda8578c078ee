//! Reputation API Endpoints
//!
//! Lookup, strict create/update/delete, and violation reporting for single
//! IPs and batches.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{ReputationError, Result};
use crate::reputation::{
    BatchRejection, ReputationEntry, ReputationService, ViolationReport, parse_ip,
};

/// Errno values reported in batch error bodies
pub const ERRNO_INVALID_IP: u32 = 40;
pub const ERRNO_INVALID_VIOLATION_TYPE: u32 = 42;
pub const ERRNO_MISSING_IP_VIOLATION_ENTRY: u32 = 53;

/// API state for reputation endpoints
#[derive(Clone)]
pub struct ApiState {
    pub service: ReputationService,
    /// Served verbatim by `GET /__version__`
    pub version_file: PathBuf,
}

impl ApiState {
    pub fn new(service: ReputationService) -> Self {
        Self {
            service,
            version_file: PathBuf::from("version.json"),
        }
    }
}

// Request types

#[derive(Debug, Deserialize)]
pub struct ReputationRequest {
    #[serde(default, alias = "IP", alias = "Ip")]
    pub ip: Option<String>,
    #[serde(alias = "Reputation")]
    pub reputation: i64,
}

#[derive(Debug, Deserialize)]
pub struct ViolationRequest {
    #[serde(alias = "Violation")]
    pub violation: String,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct ViolationsResponse {
    pub penalties: BTreeMap<String, u8>,
    pub default_penalty: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryErrorResponse {
    #[serde(rename = "Errno")]
    pub errno: u32,
    #[serde(rename = "EntryIndex")]
    pub entry_index: usize,
    #[serde(rename = "Entry")]
    pub entry: ViolationReport,
    #[serde(rename = "Msg")]
    pub msg: String,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ReputationError::InvalidInput(format!("malformed request body: {}", e)))
}

// Endpoints

/// GET /{ip} - Look up a reputation
pub async fn get_reputation(
    State(state): State<ApiState>,
    Path(ip): Path<String>,
) -> Result<Json<ReputationEntry>> {
    let record = state.service.get(&ip).await?;
    Ok(Json(ReputationEntry::from(&record)))
}

/// POST / - Create a reputation; 409 if one exists
pub async fn create_reputation(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode> {
    let request: ReputationRequest = parse_body(&body)?;
    let ip = request
        .ip
        .ok_or_else(|| ReputationError::InvalidInput("missing ip in request body".to_string()))?;

    state.service.create(&ip, request.reputation).await?;
    Ok(StatusCode::CREATED)
}

/// PUT /{ip} - Replace an existing reputation. Any IP in the body is ignored.
pub async fn update_reputation(
    State(state): State<ApiState>,
    Path(ip): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    let request: ReputationRequest = parse_body(&body)?;
    if let Some(body_ip) = request.ip.as_deref()
        && body_ip != ip
    {
        info!(path_ip = %ip, body_ip = %body_ip, "Ignoring IP in request body");
    }

    state.service.update(&ip, request.reputation).await?;
    Ok(StatusCode::OK)
}

/// DELETE /{ip}
pub async fn delete_reputation(
    State(state): State<ApiState>,
    Path(ip): Path<String>,
) -> Result<StatusCode> {
    state.service.delete(&ip).await?;
    Ok(StatusCode::OK)
}

/// GET /violations - Current penalty table
pub async fn list_violations(State(state): State<ApiState>) -> Json<ViolationsResponse> {
    let policy = state.service.policy();
    Json(ViolationsResponse {
        penalties: policy.penalties.clone(),
        default_penalty: policy.default_penalty,
    })
}

/// PUT /violations/{ip} - Apply one violation, creating the entry if needed
pub async fn put_violation(
    State(state): State<ApiState>,
    Path(ip): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    let request: ViolationRequest = parse_body(&body)?;
    state.service.report_violation(&ip, &request.violation).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /violations/ - Apply a batch of violations
pub async fn put_violations(State(state): State<ApiState>, body: Bytes) -> Response {
    let entries: Vec<ViolationReport> = match parse_body(&body) {
        Ok(entries) => entries,
        Err(e) => return e.into_response(),
    };

    match state.service.report_violations(&entries).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(BatchRejection::Empty) => {
            warn!(errno = ERRNO_MISSING_IP_VIOLATION_ENTRY, "Empty violation batch");
            (StatusCode::BAD_REQUEST, "no violation entries in request body").into_response()
        }
        Err(BatchRejection::TooMany { count, max }) => {
            warn!(count, max, "Violation batch too large");
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("{} violation entries exceeds the limit of {}", count, max),
            )
                .into_response()
        }
        Err(BatchRejection::InvalidEntry {
            index,
            entry,
            error,
        }) => {
            let errno = if parse_ip(&entry.ip).is_err() {
                ERRNO_INVALID_IP
            } else {
                ERRNO_INVALID_VIOLATION_TYPE
            };
            info!(errno, index, error = %error, "Rejected violation batch entry");
            (
                StatusCode::BAD_REQUEST,
                Json(EntryErrorResponse {
                    errno,
                    entry_index: index,
                    entry,
                    msg: error.to_string(),
                }),
            )
                .into_response()
        }
        Err(BatchRejection::Store(error)) => error.into_response(),
    }
}

/// Create the reputation router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(create_reputation))
        .route("/violations", get(list_violations))
        .route("/violations/", put(put_violations))
        .route("/violations/{ip}", put(put_violation))
        .route(
            "/{ip}",
            get(get_reputation)
                .put(update_reputation)
                .delete(delete_reputation),
        )
        .with_state(state)
}
