//! Reputation Record Types
//!
//! A record is keyed by a canonical IP address and carries a score bounded to
//! `[MIN_REPUTATION, MAX_REPUTATION]`. Higher is more trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::error::{ReputationError, Result};

pub const MIN_REPUTATION: u8 = 0;
pub const MAX_REPUTATION: u8 = 100;

/// Starting score for an IP first seen through a violation report
pub const DEFAULT_VIOLATION_BASELINE: u8 = 50;

/// Stored reputation state for a single IP address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub ip: IpAddr,

    /// Always within `[0, 100]`
    pub reputation: u8,

    /// Updated on every mutation (create, update, violation, decay)
    pub last_modified: DateTime<Utc>,
}

impl ReputationRecord {
    pub fn new(ip: IpAddr, reputation: i64) -> Self {
        Self {
            ip,
            reputation: clamp_reputation(reputation),
            last_modified: Utc::now(),
        }
    }

    /// Apply a signed delta, clamping the result
    pub fn apply_delta(&mut self, delta: i64) {
        self.reputation = clamp_reputation(i64::from(self.reputation).saturating_add(delta));
        self.last_modified = Utc::now();
    }
}

/// Clamp an arbitrary score into the valid reputation range
pub fn clamp_reputation(value: i64) -> u8 {
    value.clamp(i64::from(MIN_REPUTATION), i64::from(MAX_REPUTATION)) as u8
}

/// Parse a textual IP address into its canonical form.
///
/// CIDR notation is rejected; records are per address.
pub fn parse_ip(raw: &str) -> Result<IpAddr> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReputationError::InvalidInput("missing IP address".to_string()));
    }
    if trimmed.contains('/') {
        return Err(ReputationError::InvalidInput(format!(
            "CIDR ranges are not supported: {}",
            trimmed
        )));
    }
    trimmed
        .parse::<IpAddr>()
        .map_err(|_| ReputationError::InvalidInput(format!("invalid IP: {}", trimmed)))
}

/// Wire representation returned by `GET /{ip}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEntry {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Reputation")]
    pub reputation: u8,
}

impl From<&ReputationRecord> for ReputationEntry {
    fn from(record: &ReputationRecord) -> Self {
        Self {
            ip: record.ip.to_string(),
            reputation: record.reputation,
        }
    }
}
