//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::memory::MemoryStore;
use crate::database::reputation::PgReputationStore;
use crate::database::store::ReputationStore;
use crate::error::{ReputationError, Result};

pub struct DatabasePool {
    pool: PgPool,
    reputation: Arc<PgReputationStore>,
}

impl DatabasePool {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.store_timeout_secs);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect(&config.postgres_url)
            .await
            .map_err(|e| {
                ReputationError::StoreUnavailable(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        let reputation = Arc::new(PgReputationStore::new(pool.clone(), timeout));
        Ok(Self { pool, reputation })
    }

    pub async fn init_schema(&self) -> Result<()> {
        self.reputation.init_schema().await
    }

    pub fn reputation(&self) -> Arc<PgReputationStore> {
        self.reputation.clone()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Build the process-wide store selected by configuration
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn ReputationStore>> {
    if config.use_memory_store {
        warn!("Using in-memory reputation store - data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = DatabasePool::connect(config).await?;
    db.init_schema().await?;
    Ok(db.reputation())
}
