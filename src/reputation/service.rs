//! Reputation Service
//!
//! Translates caller requests into store operations. Plain create/update/delete
//! have strict existence semantics; violation reporting is upsert-always and
//! goes through the store's atomic `adjust`. The two paths stay separate so a
//! conflict on one is never masked by the other.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::ReputationStore;
use crate::error::{ReputationError, Result};
use crate::reputation::policy::{ViolationPolicy, validate_violation_name};
use crate::reputation::record::{DEFAULT_VIOLATION_BASELINE, ReputationRecord, parse_ip};

pub const DEFAULT_MAX_VIOLATION_ENTRIES: usize = 100;

/// One `(ip, violation)` pair in a batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    #[serde(alias = "IP", alias = "Ip")]
    pub ip: String,
    #[serde(alias = "Violation")]
    pub violation: String,
}

/// Why a batch of violation reports was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRejection {
    Empty,
    TooMany { count: usize, max: usize },
    InvalidEntry {
        index: usize,
        entry: ViolationReport,
        error: ReputationError,
    },
    Store(ReputationError),
}

#[derive(Clone)]
pub struct ReputationService {
    store: Arc<dyn ReputationStore>,
    policy: Arc<ViolationPolicy>,
    violation_baseline: u8,
    max_violation_entries: usize,
}

impl ReputationService {
    pub fn new(store: Arc<dyn ReputationStore>, policy: ViolationPolicy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
            violation_baseline: DEFAULT_VIOLATION_BASELINE,
            max_violation_entries: DEFAULT_MAX_VIOLATION_ENTRIES,
        }
    }

    pub fn with_violation_baseline(mut self, baseline: u8) -> Self {
        self.violation_baseline = baseline;
        self
    }

    pub fn with_max_violation_entries(mut self, max: usize) -> Self {
        self.max_violation_entries = max;
        self
    }

    pub async fn get(&self, ip: &str) -> Result<ReputationRecord> {
        let ip = parse_ip(ip)?;
        self.store.get(ip).await
    }

    pub async fn create(&self, ip: &str, reputation: i64) -> Result<ReputationRecord> {
        let ip = parse_ip(ip)?;
        let record = self.store.create(ip, reputation).await?;
        info!(ip = %ip, reputation = record.reputation, "Created reputation entry");
        Ok(record)
    }

    pub async fn update(&self, ip: &str, reputation: i64) -> Result<ReputationRecord> {
        let ip = parse_ip(ip)?;
        let record = self.store.set(ip, reputation).await?;
        info!(ip = %ip, reputation = record.reputation, "Updated reputation entry");
        Ok(record)
    }

    pub async fn delete(&self, ip: &str) -> Result<()> {
        let ip = parse_ip(ip)?;
        self.store.delete(ip).await?;
        info!(ip = %ip, "Deleted reputation entry");
        Ok(())
    }

    /// Apply a violation penalty, creating the record at the baseline if the
    /// IP has never been seen.
    pub async fn report_violation(&self, ip: &str, violation: &str) -> Result<ReputationRecord> {
        let ip = parse_ip(ip)?;
        validate_violation_name(violation)?;

        let delta = self.policy.penalty_for(violation);
        if !self.policy.is_known(violation) {
            debug!(violation = %violation, "Unknown violation type, applying default penalty");
        }

        let record = self.store.adjust(ip, delta, self.violation_baseline).await?;
        info!(
            ip = %ip,
            violation = %violation,
            delta,
            reputation = record.reputation,
            "Applied violation penalty"
        );
        Ok(record)
    }

    /// Apply a batch of violation reports. Every entry is validated before any
    /// penalty is applied; a store failure stops the batch at that entry.
    pub async fn report_violations(
        &self,
        entries: &[ViolationReport],
    ) -> std::result::Result<usize, BatchRejection> {
        if entries.is_empty() {
            return Err(BatchRejection::Empty);
        }
        if entries.len() > self.max_violation_entries {
            return Err(BatchRejection::TooMany {
                count: entries.len(),
                max: self.max_violation_entries,
            });
        }

        let mut validated = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let checked = parse_ip(&entry.ip)
                .and_then(|ip| validate_violation_name(&entry.violation).map(|_| ip));
            match checked {
                Ok(ip) => validated.push((ip, self.policy.penalty_for(&entry.violation))),
                Err(error) => {
                    return Err(BatchRejection::InvalidEntry {
                        index,
                        entry: entry.clone(),
                        error,
                    });
                }
            }
        }

        for (ip, delta) in &validated {
            self.store
                .adjust(*ip, *delta, self.violation_baseline)
                .await
                .map_err(BatchRejection::Store)?;
        }

        info!(count = validated.len(), "Applied batch of violation penalties");
        Ok(validated.len())
    }

    pub fn policy(&self) -> &ViolationPolicy {
        &self.policy
    }

    pub fn violation_baseline(&self) -> u8 {
        self.violation_baseline
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use std::collections::BTreeMap;

    fn service() -> ReputationService {
        let mut penalties = BTreeMap::new();
        penalties.insert("test_violation".to_string(), 5);
        penalties.insert("ban".to_string(), 100);
        let policy = ViolationPolicy::new(penalties, 30).unwrap();
        ReputationService::new(Arc::new(MemoryStore::new()), policy)
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let service = service();

        service.create("192.0.2.1", 50).await.unwrap();
        assert_eq!(service.get("192.0.2.1").await.unwrap().reputation, 50);

        service.update("192.0.2.1", 70).await.unwrap();
        assert_eq!(service.get("192.0.2.1").await.unwrap().reputation, 70);

        service.delete("192.0.2.1").await.unwrap();
        assert!(matches!(
            service.get("192.0.2.1").await,
            Err(ReputationError::NotFound(_))
        ));

        service.report_violation("192.0.2.1", "test_violation").await.unwrap();
        assert_eq!(service.get("192.0.2.1").await.unwrap().reputation, 45);
    }

    #[tokio::test]
    async fn test_unknown_violation_still_penalizes() {
        let service = service();
        service.create("192.0.2.7", 100).await.unwrap();
        let record = service.report_violation("192.0.2.7", "mystery").await.unwrap();
        assert_eq!(record.reputation, 70);
        assert!(record.reputation < 72);
    }

    #[tokio::test]
    async fn test_violation_floor_is_zero() {
        let service = service();
        let record = service.report_violation("2001:db8::1", "ban").await.unwrap();
        assert_eq!(record.reputation, 0);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_store() {
        let service = service();
        assert!(matches!(
            service.report_violation("not-an-ip", "test_violation").await,
            Err(ReputationError::InvalidInput(_))
        ));
        assert!(matches!(
            service.report_violation("192.0.2.1", "bad name!").await,
            Err(ReputationError::InvalidInput(_))
        ));
        assert!(matches!(
            service.get("192.0.2.1").await,
            Err(ReputationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_baseline() {
        let service = service().with_violation_baseline(80);
        let record = service.report_violation("192.0.2.3", "test_violation").await.unwrap();
        assert_eq!(record.reputation, 75);
    }

    #[tokio::test]
    async fn test_batch_rejects_before_applying() {
        let service = service();
        let entries = vec![
            ViolationReport {
                ip: "192.0.2.1".to_string(),
                violation: "test_violation".to_string(),
            },
            ViolationReport {
                ip: "bogus".to_string(),
                violation: "test_violation".to_string(),
            },
        ];

        match service.report_violations(&entries).await {
            Err(BatchRejection::InvalidEntry { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(service.get("192.0.2.1").await.is_err());
    }

    #[tokio::test]
    async fn test_batch_limits() {
        let service = service().with_max_violation_entries(2);
        assert_eq!(service.report_violations(&[]).await, Err(BatchRejection::Empty));

        let entry = ViolationReport {
            ip: "192.0.2.1".to_string(),
            violation: "test_violation".to_string(),
        };
        let entries = vec![entry.clone(), entry.clone(), entry];
        assert_eq!(
            service.report_violations(&entries).await,
            Err(BatchRejection::TooMany { count: 3, max: 2 })
        );
    }

    #[tokio::test]
    async fn test_batch_applies_each_entry() {
        let service = service();
        let entries = vec![
            ViolationReport {
                ip: "192.0.2.1".to_string(),
                violation: "test_violation".to_string(),
            },
            ViolationReport {
                ip: "192.0.2.1".to_string(),
                violation: "test_violation".to_string(),
            },
            ViolationReport {
                ip: "192.0.2.2".to_string(),
                violation: "unlisted".to_string(),
            },
        ];
        assert_eq!(service.report_violations(&entries).await, Ok(3));
        assert_eq!(service.get("192.0.2.1").await.unwrap().reputation, 40);
        assert_eq!(service.get("192.0.2.2").await.unwrap().reputation, 20);
    }
}
