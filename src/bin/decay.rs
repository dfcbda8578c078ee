//! Run one decay pass and exit. Meant for cron or a Kubernetes CronJob; the
//! scheduler must not start a pass while the previous one is still running.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ip_reputation::{DecayEngine, ServiceConfig, logging::init_logging, open_store};

#[derive(Parser)]
#[command(name = "decay", version, about = "Raise every low reputation by the decay rate")]
struct Cli {
    /// Points restored per pass; overrides the configured decay_rate
    #[arg(long)]
    rate: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(rate) = cli.rate {
        config.reputation.decay_rate = rate;
    }

    init_logging(&config.logging)?;

    let store = open_store(&config.database)
        .await
        .context("Failed to open reputation store")?;
    let engine = DecayEngine::new(store, config.reputation.decay_rate)?;

    info!(rate = engine.rate(), "Starting decay pass");
    let report = engine.run().await.context("Decay pass failed")?;
    info!(
        records_touched = report.records_touched,
        started_at = %report.started_at,
        "Decay finished"
    );

    Ok(())
}
