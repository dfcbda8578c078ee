//! The reputation store abstraction.
//!
//! All mutation goes through `create`, `set`, `adjust` and `decay_all`, each of
//! which is a single atomic operation against the backing store. Callers never
//! read a value, compute a new one and write it back.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::error::Result;
use crate::reputation::ReputationRecord;

#[async_trait]
pub trait ReputationStore: Send + Sync {
    /// Fetch the record for `ip`, or `NotFound`
    async fn get(&self, ip: IpAddr) -> Result<ReputationRecord>;

    /// Insert a new record. Fails with `AlreadyExists` if `ip` is present.
    async fn create(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord>;

    /// Overwrite an existing record's score. Fails with `NotFound` if absent.
    async fn set(&self, ip: IpAddr, reputation: i64) -> Result<ReputationRecord>;

    /// Remove the record. Fails with `NotFound` if absent.
    async fn delete(&self, ip: IpAddr) -> Result<()>;

    /// Atomically add `delta` to the score, creating the record at
    /// `default_if_absent` first when missing. Result is clamped to `[0, 100]`.
    async fn adjust(&self, ip: IpAddr, delta: i64, default_if_absent: u8)
    -> Result<ReputationRecord>;

    /// Add `rate` to every record at or below `100 - rate` in one pass.
    /// Returns the number of records touched; a rate above 100 touches none.
    async fn decay_all(&self, rate: u8) -> Result<u64>;

    /// Liveness probe for the backing store
    async fn ping(&self) -> Result<()>;
}
