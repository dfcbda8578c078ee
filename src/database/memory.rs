//! In-memory reputation store for tests and local development

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::store::ReputationStore;
use crate::error::{ReputationError, Result};
use crate::reputation::{MAX_REPUTATION, ReputationRecord, clamp_reputation};

/// A map behind a single async lock. Every mutation holds the write lock for
/// its whole read-modify-write, and `decay_all` holds it for the full pass.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<IpAddr, ReputationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ReputationStore for MemoryStore {
    async fn get(&self, ip: IpAddr) -> Result<ReputationRecord> {
        let records = self.records.read().await;
        records
            .get(&ip)
            .cloned()
            .ok_or_else(|| ReputationError::NotFound(ip.to_string()))
    }

    async fn create(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&ip) {
            return Err(ReputationError::AlreadyExists(ip.to_string()));
        }
        let record = ReputationRecord::new(ip, reputation);
        records.insert(ip, record.clone());
        Ok(record)
    }

    async fn set(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&ip)
            .ok_or_else(|| ReputationError::NotFound(ip.to_string()))?;
        record.reputation = clamp_reputation(reputation);
        record.last_modified = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, ip: IpAddr) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .remove(&ip)
            .map(|_| ())
            .ok_or_else(|| ReputationError::NotFound(ip.to_string()))
    }

    async fn adjust(
        &self,
        ip: IpAddr,
        delta: i64,
        default_if_absent: u8,
    ) -> Result<ReputationRecord> {
        let mut records = self.records.write().await;
        let record = match records.get_mut(&ip) {
            Some(record) => {
                record.apply_delta(delta);
                record.clone()
            }
            None => {
                let start = i64::from(default_if_absent);
                let record = ReputationRecord::new(ip, start.saturating_add(delta));
                records.insert(ip, record.clone());
                record
            }
        };
        Ok(record)
    }

    async fn decay_all(&self, rate: u8) -> Result<u64> {
        // A rate above the maximum would push any record past the bound
        if rate > MAX_REPUTATION {
            return Ok(0);
        }
        let threshold = MAX_REPUTATION - rate;
        let now = Utc::now();
        let mut records = self.records.write().await;
        let mut touched = 0u64;
        for record in records.values_mut() {
            if record.reputation <= threshold {
                record.reputation += rate;
                record.last_modified = now;
                touched += 1;
            }
        }
        debug!(rate, touched, "Decayed in-memory reputation records");
        Ok(touched)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 50).await.unwrap();
        let record = store.get(ip("192.0.2.1")).await.unwrap();
        assert_eq!(record.reputation, 50);
    }

    #[tokio::test]
    async fn test_create_is_strict() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 50).await.unwrap();
        let err = store.create(ip("192.0.2.1"), 10).await.unwrap_err();
        assert!(matches!(err, ReputationError::AlreadyExists(_)));
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 50);
    }

    #[tokio::test]
    async fn test_create_and_set_clamp() {
        let store = MemoryStore::new();
        assert_eq!(store.create(ip("192.0.2.1"), 500).await.unwrap().reputation, 100);
        assert_eq!(store.set(ip("192.0.2.1"), -4).await.unwrap().reputation, 0);
    }

    #[tokio::test]
    async fn test_set_requires_existing_record() {
        let store = MemoryStore::new();
        let err = store.set(ip("192.0.2.1"), 70).await.unwrap_err();
        assert!(matches!(err, ReputationError::NotFound(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 50).await.unwrap();
        store.delete(ip("192.0.2.1")).await.unwrap();
        assert!(matches!(
            store.get(ip("192.0.2.1")).await,
            Err(ReputationError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(ip("192.0.2.1")).await,
            Err(ReputationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_adjust_creates_from_default() {
        let store = MemoryStore::new();
        let record = store.adjust(ip("192.0.2.9"), -5, 50).await.unwrap();
        assert_eq!(record.reputation, 45);

        let record = store.adjust(ip("192.0.2.10"), -80, 50).await.unwrap();
        assert_eq!(record.reputation, 0);
    }

    #[tokio::test]
    async fn test_adjust_existing_clamps() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 10).await.unwrap();
        assert_eq!(store.adjust(ip("192.0.2.1"), -25, 50).await.unwrap().reputation, 0);
        assert_eq!(store.adjust(ip("192.0.2.1"), 300, 50).await.unwrap().reputation, 100);
    }

    #[tokio::test]
    async fn test_adjust_extreme_deltas_clamp() {
        let store = MemoryStore::new();
        assert_eq!(store.adjust(ip("192.0.2.1"), i64::MAX, 50).await.unwrap().reputation, 100);
        assert_eq!(store.adjust(ip("192.0.2.2"), i64::MIN, 50).await.unwrap().reputation, 0);

        store.create(ip("192.0.2.3"), 40).await.unwrap();
        assert_eq!(store.adjust(ip("192.0.2.3"), i64::MAX, 50).await.unwrap().reputation, 100);
        assert_eq!(store.adjust(ip("192.0.2.3"), i64::MIN, 50).await.unwrap().reputation, 0);
    }

    #[tokio::test]
    async fn test_decay_rate_above_maximum_touches_nothing() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 0).await.unwrap();
        store.create(ip("192.0.2.2"), 100).await.unwrap();

        assert_eq!(store.decay_all(150).await.unwrap(), 0);
        assert_eq!(store.decay_all(u8::MAX).await.unwrap(), 0);
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 0);
        assert_eq!(store.get(ip("192.0.2.2")).await.unwrap().reputation, 100);
    }

    #[tokio::test]
    async fn test_adjust_updates_last_modified() {
        let store = MemoryStore::new();
        let created = store.create(ip("192.0.2.1"), 80).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let adjusted = store.adjust(ip("192.0.2.1"), -1, 50).await.unwrap();
        assert!(adjusted.last_modified > created.last_modified);
    }

    #[tokio::test]
    async fn test_decay_boundary() {
        let store = MemoryStore::new();
        store.create(ip("192.0.2.1"), 95).await.unwrap();
        store.create(ip("192.0.2.2"), 99).await.unwrap();
        store.create(ip("192.0.2.3"), 100).await.unwrap();
        store.create(ip("192.0.2.4"), 98).await.unwrap();

        let touched = store.decay_all(2).await.unwrap();
        assert_eq!(touched, 2);
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 97);
        assert_eq!(store.get(ip("192.0.2.2")).await.unwrap().reputation, 99);
        assert_eq!(store.get(ip("192.0.2.3")).await.unwrap().reputation, 100);
        assert_eq!(store.get(ip("192.0.2.4")).await.unwrap().reputation, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjust_loses_no_updates() {
        let store = Arc::new(MemoryStore::new());
        store.create(ip("192.0.2.1"), 50).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..60 {
            let store = store.clone();
            let delta = if i % 3 == 0 { 1 } else { -1 };
            handles.push(tokio::spawn(async move {
                store.adjust(ip("192.0.2.1"), delta, 50).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 20 increments and 40 decrements never reach a bound from 50
        assert_eq!(store.get(ip("192.0.2.1")).await.unwrap().reputation, 30);
    }
}
