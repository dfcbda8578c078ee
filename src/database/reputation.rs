//! PostgreSQL reputation store
//!
//! One row per IP. Bounds are enforced both by the clamping expressions below
//! and by the table's CHECK constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};

use crate::database::store::ReputationStore;
use crate::error::{ReputationError, Result};
use crate::reputation::{MAX_REPUTATION, ReputationRecord, clamp_reputation};

const CREATE_REPUTATION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS reputation (
        ip TEXT PRIMARY KEY,
        reputation INTEGER NOT NULL CHECK (reputation >= 0 AND reputation <= 100),
        last_modified TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
"#;

pub struct PgReputationStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgReputationStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Create the reputation table if it does not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing reputation schema...");
        self.bounded(sqlx::query(CREATE_REPUTATION_TABLE).execute(&self.pool))
            .await?;
        self.bounded(
            sqlx::query("CREATE INDEX IF NOT EXISTS reputation_score_idx ON reputation(reputation)")
                .execute(&self.pool),
        )
        .await?;
        info!("Reputation schema initialized");
        Ok(())
    }

    /// Remove every record. Used by tests against a scratch database.
    pub async fn truncate(&self) -> Result<()> {
        self.bounded(sqlx::query("TRUNCATE TABLE reputation").execute(&self.pool))
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a store call under the configured timeout. A statement that times
    /// out is reported as unavailable; Postgres either committed it or not.
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(ReputationError::from),
            Err(_) => Err(ReputationError::StoreUnavailable(format!(
                "store call exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

fn record_from_row(row: &PgRow) -> Result<ReputationRecord> {
    let ip: String = row.try_get("ip")?;
    let reputation: i32 = row.try_get("reputation")?;
    let last_modified: DateTime<Utc> = row.try_get("last_modified")?;

    let ip = ip.parse::<IpAddr>().map_err(|_| {
        ReputationError::StoreUnavailable(format!("stored key is not an IP address: {}", ip))
    })?;

    Ok(ReputationRecord {
        ip,
        reputation: clamp_reputation(i64::from(reputation)),
        last_modified,
    })
}

/// Bind values for the integer column. Inputs are clamped before they reach SQL.
fn bounded_score(value: i64) -> i32 {
    i32::from(clamp_reputation(value))
}

/// Deltas beyond +/-100 have the same effect as +/-100
fn bounded_delta(delta: i64) -> i32 {
    delta.clamp(-i64::from(MAX_REPUTATION), i64::from(MAX_REPUTATION)) as i32
}

#[async_trait]
impl ReputationStore for PgReputationStore {
    async fn get(&self, ip: IpAddr) -> Result<ReputationRecord> {
        let row = self
            .bounded(
                sqlx::query(
                    "SELECT ip, reputation, last_modified FROM reputation WHERE ip = $1",
                )
                .bind(ip.to_string())
                .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(ReputationError::NotFound(ip.to_string())),
        }
    }

    async fn create(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord> {
        let row = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO reputation (ip, reputation, last_modified)
                    VALUES ($1, $2, NOW())
                    ON CONFLICT (ip) DO NOTHING
                    RETURNING ip, reputation, last_modified
                    "#,
                )
                .bind(ip.to_string())
                .bind(bounded_score(reputation))
                .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(ReputationError::AlreadyExists(ip.to_string())),
        }
    }

    async fn set(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord> {
        let row = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE reputation
                    SET reputation = $2, last_modified = NOW()
                    WHERE ip = $1
                    RETURNING ip, reputation, last_modified
                    "#,
                )
                .bind(ip.to_string())
                .bind(bounded_score(reputation))
                .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(ReputationError::NotFound(ip.to_string())),
        }
    }

    async fn delete(&self, ip: IpAddr) -> Result<()> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM reputation WHERE ip = $1")
                    .bind(ip.to_string())
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReputationError::NotFound(ip.to_string()));
        }
        Ok(())
    }

    async fn adjust(
        &self,
        ip: IpAddr,
        delta: i64,
        default_if_absent: u8,
    ) -> Result<ReputationRecord> {
        // Single statement: the row lock taken by ON CONFLICT serializes
        // concurrent reporters for the same IP.
        let row = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO reputation (ip, reputation, last_modified)
                    VALUES ($1, GREATEST(0, LEAST(100, $3 + $2)), NOW())
                    ON CONFLICT (ip) DO UPDATE SET
                        reputation = GREATEST(0, LEAST(100, reputation.reputation + $2)),
                        last_modified = NOW()
                    RETURNING ip, reputation, last_modified
                    "#,
                )
                .bind(ip.to_string())
                .bind(bounded_delta(delta))
                .bind(i32::from(default_if_absent))
                .fetch_one(&self.pool),
            )
            .await?;

        let record = record_from_row(&row)?;
        debug!(ip = %ip, delta, reputation = record.reputation, "Adjusted reputation");
        Ok(record)
    }

    async fn decay_all(&self, rate: u8) -> Result<u64> {
        if rate > MAX_REPUTATION {
            return Ok(0);
        }
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE reputation
                    SET reputation = reputation + $1, last_modified = NOW()
                    WHERE reputation <= 100 - $1
                    "#,
                )
                .bind(i32::from(rate))
                .execute(&self.pool),
            )
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            debug!("Decayed {} reputation records by {}", count, rate);
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let one: i32 = self
            .bounded(sqlx::query_scalar("SELECT 1").fetch_one(&self.pool))
            .await?;
        if one != 1 {
            return Err(ReputationError::StoreUnavailable(
                "database returned an unexpected liveness result".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_bind_values() {
        assert_eq!(bounded_score(150), 100);
        assert_eq!(bounded_score(-3), 0);
        assert_eq!(bounded_delta(-5), -5);
        assert_eq!(bounded_delta(i64::MIN), -100);
        assert_eq!(bounded_delta(i64::MAX), 100);
    }
}
