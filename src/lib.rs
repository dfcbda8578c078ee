//! IP Reputation Service
//!
//! Stores a trust score in `[0, 100]` per IP address, lowers it when callers
//! report violations, and lets it recover through a scheduled decay pass.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - HTTP server entrypoint
//! ├── bin/
//! │   ├── decay.rs     - One decay pass, run by an external scheduler
//! │   └── iprep-cli.rs - Command line client
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Error taxonomy
//! ├── logging.rs     - Tracing subscriber setup
//! ├── reputation/    - Domain rules
//! │   ├── record.rs  - Records, bounds and IP parsing
//! │   ├── policy.rs  - Violation penalty table
//! │   ├── service.rs - CRUD and violation reporting
//! │   └── decay.rs   - Decay engine
//! ├── database/      - Persistence
//! │   ├── store.rs      - ReputationStore trait
//! │   ├── reputation.rs - PostgreSQL store
//! │   ├── memory.rs     - In-memory store
//! │   └── pool.rs       - Connection pool and store selection
//! └── api/           - HTTP endpoints
//!     ├── reputation.rs - Reputation and violation routes
//!     ├── health.rs     - Heartbeats and version
//!     ├── middleware.rs - Body limits, headers, request logging
//!     └── client.rs     - HTTP client
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod reputation;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use database::{DatabasePool, MemoryStore, PgReputationStore, ReputationStore, open_store};
pub use error::{ReputationError, Result};

// Re-export API types
pub use api::{ApiState, MiddlewareConfig, ReputationClient, build_app};

// Re-export reputation types
pub use reputation::{
    DecayEngine, DecayReport, ReputationEntry, ReputationRecord, ReputationService,
    ViolationPolicy, ViolationReport,
};
