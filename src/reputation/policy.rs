//! Violation Penalties
//!
//! Maps a reported violation category to the number of points it removes.
//! The table is configuration; an unknown category never blocks a report and
//! falls back to the default penalty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ReputationError, Result};
use crate::reputation::record::MAX_REPUTATION;

pub const DEFAULT_PENALTY: u8 = 30;
pub const MAX_VIOLATION_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPolicy {
    /// Violation name -> points deducted, each within `[0, 100]`
    pub penalties: BTreeMap<String, u8>,

    /// Applied to any violation name missing from `penalties`
    pub default_penalty: u8,
}

impl ViolationPolicy {
    pub fn new(penalties: BTreeMap<String, u8>, default_penalty: u8) -> Result<Self> {
        if default_penalty > MAX_REPUTATION {
            return Err(ReputationError::InvalidInput(format!(
                "default penalty {} is outside [0, {}]",
                default_penalty, MAX_REPUTATION
            )));
        }
        for (name, penalty) in &penalties {
            validate_violation_name(name)?;
            if *penalty > MAX_REPUTATION {
                return Err(ReputationError::InvalidInput(format!(
                    "penalty {} for {} is outside [0, {}]",
                    penalty, name, MAX_REPUTATION
                )));
            }
        }
        Ok(Self {
            penalties,
            default_penalty,
        })
    }

    /// Signed delta to apply for a violation; always zero or negative
    pub fn penalty_for(&self, violation: &str) -> i64 {
        let points = self
            .penalties
            .get(violation)
            .copied()
            .unwrap_or(self.default_penalty);
        -i64::from(points)
    }

    pub fn is_known(&self, violation: &str) -> bool {
        self.penalties.contains_key(violation)
    }
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self {
            penalties: BTreeMap::new(),
            default_penalty: DEFAULT_PENALTY,
        }
    }
}

/// Violation names are 1-255 characters of `[A-Za-z0-9_:.-]`
pub fn validate_violation_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_VIOLATION_NAME_LEN {
        return Err(ReputationError::InvalidInput(format!(
            "violation type must be 1-{} characters",
            MAX_VIOLATION_NAME_LEN
        )));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
    if !valid {
        return Err(ReputationError::InvalidInput(format!(
            "invalid violation type: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ViolationPolicy {
        let mut penalties = BTreeMap::new();
        penalties.insert("password-reset-rate-limit-exceeded".to_string(), 5);
        penalties.insert("fxa:request.check_authentication_failed".to_string(), 20);
        ViolationPolicy::new(penalties, 30).unwrap()
    }

    #[test]
    fn test_known_violation_penalty() {
        let policy = policy();
        assert_eq!(policy.penalty_for("password-reset-rate-limit-exceeded"), -5);
        assert_eq!(policy.penalty_for("fxa:request.check_authentication_failed"), -20);
    }

    #[test]
    fn test_unknown_violation_uses_default() {
        let policy = policy();
        assert!(!policy.is_known("never-heard-of-it"));
        assert_eq!(policy.penalty_for("never-heard-of-it"), -30);
    }

    #[test]
    fn test_rejects_out_of_range_penalties() {
        let mut penalties = BTreeMap::new();
        penalties.insert("too-big".to_string(), 101);
        assert!(ViolationPolicy::new(penalties, 10).is_err());
        assert!(ViolationPolicy::new(BTreeMap::new(), 200).is_err());
    }

    #[test]
    fn test_violation_name_validation() {
        assert!(validate_violation_name("rate_limit:login").is_ok());
        assert!(validate_violation_name("").is_err());
        assert!(validate_violation_name("has space").is_err());
        assert!(validate_violation_name(&"a".repeat(256)).is_err());
        assert!(validate_violation_name(&"a".repeat(255)).is_ok());
    }
}
