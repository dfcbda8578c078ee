//! Decay Engine
//!
//! Moves every score at or below `100 - rate` up by `rate`, modelling trust
//! recovering over time. One pass is one bulk store operation; there is no
//! per-record loop and no retry. The external scheduler retries on its next
//! cycle and must not overlap invocations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::database::ReputationStore;
use crate::error::{ReputationError, Result};
use crate::reputation::record::MAX_REPUTATION;

#[derive(Debug, Clone, Serialize)]
pub struct DecayReport {
    pub rate: u8,
    pub records_touched: u64,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub elapsed: Duration,
}

pub struct DecayEngine {
    store: Arc<dyn ReputationStore>,
    rate: u8,
}

impl DecayEngine {
    /// `rate` must be within `1..=100`
    pub fn new(store: Arc<dyn ReputationStore>, rate: u8) -> Result<Self> {
        validate_decay_rate(rate)?;
        Ok(Self { store, rate })
    }

    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// Run a single decay pass over the whole store
    pub async fn run(&self) -> Result<DecayReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let records_touched = self.store.decay_all(self.rate).await.map_err(|e| {
            error!(rate = self.rate, error = %e, "Decay pass aborted");
            e
        })?;

        let report = DecayReport {
            rate: self.rate,
            records_touched,
            started_at,
            elapsed: start.elapsed(),
        };
        info!(
            rate = report.rate,
            records_touched = report.records_touched,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Decay pass complete"
        );
        Ok(report)
    }
}

pub fn validate_decay_rate(rate: u8) -> Result<()> {
    if rate == 0 || rate > MAX_REPUTATION {
        return Err(ReputationError::InvalidInput(format!(
            "decay rate must be within 1..={}, got {}",
            MAX_REPUTATION, rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use async_trait::async_trait;
    use std::net::IpAddr;

    use crate::reputation::ReputationRecord;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_decay_scenario() {
        let store = Arc::new(MemoryStore::new());
        store.create(ip("192.0.2.1"), 95).await.unwrap();
        store.create(ip("192.0.2.2"), 99).await.unwrap();
        store.create(ip("192.0.2.3"), 100).await.unwrap();

        let engine = DecayEngine::new(store.clone(), 2).unwrap();
        let report = engine.run().await.unwrap();

        assert_eq!(report.records_touched, 1);
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 97);
        assert_eq!(store.get(ip("192.0.2.2")).await.unwrap().reputation, 99);
        assert_eq!(store.get(ip("192.0.2.3")).await.unwrap().reputation, 100);
    }

    #[tokio::test]
    async fn test_repeated_passes_never_overshoot() {
        let store = Arc::new(MemoryStore::new());
        store.create(ip("192.0.2.1"), 0).await.unwrap();
        store.create(ip("192.0.2.2"), 93).await.unwrap();

        let engine = DecayEngine::new(store.clone(), 7).unwrap();
        for _ in 0..30 {
            engine.run().await.unwrap();
        }

        // 0 climbs in steps of 7 and stops at 98; 93 reaches exactly 100
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 98);
        assert_eq!(store.get(ip("192.0.2.2")).await.unwrap().reputation, 100);
    }

    #[test]
    fn test_rate_validation() {
        assert!(validate_decay_rate(0).is_err());
        assert!(validate_decay_rate(101).is_err());
        assert!(validate_decay_rate(1).is_ok());
        assert!(validate_decay_rate(100).is_ok());
    }

    struct DownStore;

    #[async_trait]
    impl ReputationStore for DownStore {
        async fn get(&self, ip: IpAddr) -> Result<ReputationRecord> {
            Err(ReputationError::NotFound(ip.to_string()))
        }
        async fn create(&self, _: IpAddr, _: i64) -> Result<ReputationRecord> {
            Err(ReputationError::StoreUnavailable("down".into()))
        }
        async fn set(&self, _: IpAddr, _: i64) -> Result<ReputationRecord> {
            Err(ReputationError::StoreUnavailable("down".into()))
        }
        async fn delete(&self, _: IpAddr) -> Result<()> {
            Err(ReputationError::StoreUnavailable("down".into()))
        }
        async fn adjust(&self, _: IpAddr, _: i64, _: u8) -> Result<ReputationRecord> {
            Err(ReputationError::StoreUnavailable("down".into()))
        }
        async fn decay_all(&self, _: u8) -> Result<u64> {
            Err(ReputationError::StoreUnavailable("connection refused".into()))
        }
        async fn ping(&self) -> Result<()> {
            Err(ReputationError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_retried() {
        let engine = DecayEngine::new(Arc::new(DownStore), 1).unwrap();
        let err = engine.run().await.unwrap_err();
        assert!(err.is_transient());
    }
}
