//! IP Reputation Domain
//!
//! Scores live in `[0, 100]`; higher is more trusted. Callers either set a
//! score directly or report a violation, which subtracts a configured penalty.
//! A periodic decay pass lets low scores recover.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │ ViolationPolicy │────►│ ReputationService │────►│ ReputationStore │
//! │ (penalty table) │     │ (CRUD + reports)  │     │ (atomic ops)    │
//! └─────────────────┘     └───────────────────┘     └─────────────────┘
//!                                                           ▲
//!                                                  ┌────────┴────────┐
//!                                                  │   DecayEngine   │
//!                                                  │ (one bulk pass) │
//!                                                  └─────────────────┘
//! ```

mod decay;
mod policy;
mod record;
mod service;

pub use decay::{DecayEngine, DecayReport, validate_decay_rate};
pub use policy::{DEFAULT_PENALTY, MAX_VIOLATION_NAME_LEN, ViolationPolicy, validate_violation_name};
pub use record::{
    DEFAULT_VIOLATION_BASELINE, MAX_REPUTATION, MIN_REPUTATION, ReputationEntry, ReputationRecord,
    clamp_reputation, parse_ip,
};
pub use service::{
    BatchRejection, DEFAULT_MAX_VIOLATION_ENTRIES, ReputationService, ViolationReport,
};
