//! Reputation Persistence
//!
//! The `ReputationStore` trait plus its PostgreSQL and in-memory implementations.

pub mod memory;
pub mod pool;
pub mod reputation;
pub mod store;

pub use memory::MemoryStore;
pub use pool::{DatabasePool, open_store};
pub use reputation::PgReputationStore;
pub use store::ReputationStore;
