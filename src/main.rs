use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;

use ip_reputation::{
    ApiState, MiddlewareConfig, ReputationService, ServiceConfig, build_app, logging::init_logging,
    open_store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates penalties and limits
    let config = ServiceConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check IPREP_* environment variables and the config file.");
        e
    })?;

    init_logging(&config.logging)?;

    info!("Starting IP reputation service");

    let store = open_store(&config.database)
        .await
        .context("Failed to open reputation store")?;

    let policy = config.reputation.to_policy()?;
    info!(
        penalties = policy.penalties.len(),
        default_penalty = policy.default_penalty,
        violation_baseline = config.reputation.violation_baseline,
        "Violation policy loaded"
    );

    let service = ReputationService::new(store, policy)
        .with_violation_baseline(config.reputation.violation_baseline)
        .with_max_violation_entries(config.reputation.max_violation_entries);

    let app = build_app(ApiState::new(service), MiddlewareConfig::from(&config));

    // Start the server on configured host/port
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("IP reputation service listening on {}", bind_addr);
    info!(
        "Request logging={}, slow request threshold={}ms, max body={}KB",
        config.logging.log_requests,
        config.logging.slow_request_ms,
        config.http.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
