use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use tracing::info;

use crate::reputation::{
    DEFAULT_MAX_VIOLATION_ENTRIES, DEFAULT_PENALTY, DEFAULT_VIOLATION_BASELINE, MAX_REPUTATION,
    ViolationPolicy, validate_decay_rate, validate_violation_name,
};

/// Path of an optional YAML file layered under the environment
pub const CONFIG_FILE_ENV: &str = "IPREP_CONFIG_FILE";

/// Configuration for the IP reputation service and its decay job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Scoring rules
    pub reputation: ReputationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Request limits
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    pub max_connections: u32,
    /// Upper bound on any single store call, including pool acquisition
    pub store_timeout_secs: u64,
    /// Keep records in process memory instead of PostgreSQL
    pub use_memory_store: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/iprepd".to_string(),
            max_connections: 10,
            store_timeout_secs: 5,
            use_memory_store: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Starting score for an IP first seen through a violation report
    pub violation_baseline: u8,
    /// Penalty for violation names missing from `violation_penalties`
    pub default_penalty: u8,
    pub violation_penalties: BTreeMap<String, u8>,
    /// Largest accepted batch of violation reports
    pub max_violation_entries: usize,
    /// Points restored per decay pass
    pub decay_rate: u8,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            violation_baseline: DEFAULT_VIOLATION_BASELINE,
            default_penalty: DEFAULT_PENALTY,
            violation_penalties: BTreeMap::new(),
            max_violation_entries: DEFAULT_MAX_VIOLATION_ENTRIES,
            decay_rate: 1,
        }
    }
}

impl ReputationConfig {
    /// Convert to the ViolationPolicy used by ReputationService
    pub fn to_policy(&self) -> Result<ViolationPolicy> {
        ViolationPolicy::new(self.violation_penalties.clone(), self.default_penalty)
            .context("Invalid violation penalty table")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable request/response logging
    pub log_requests: bool,
    /// Requests slower than this are logged at warn
    pub slow_request_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_requests: true,
            slow_request_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;

        info!(
            host = %config.server.host,
            port = config.server.port,
            memory_store = config.database.use_memory_store,
            penalties = config.reputation.violation_penalties.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Layer `IPREP_*` variables on top of the current values. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server configuration
        if let Some(host) = lookup("IPREP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("IPREP_PORT") {
            self.server.port = port.parse().context("Invalid IPREP_PORT value")?;
        }

        // Database configuration
        if let Some(url) = lookup("IPREP_POSTGRES_URL") {
            self.database.postgres_url = url;
        }
        if let Some(max) = lookup("IPREP_MAX_CONNECTIONS") {
            self.database.max_connections =
                max.parse().context("Invalid IPREP_MAX_CONNECTIONS value")?;
        }
        if let Some(secs) = lookup("IPREP_STORE_TIMEOUT_SECS") {
            self.database.store_timeout_secs =
                secs.parse().context("Invalid IPREP_STORE_TIMEOUT_SECS value")?;
        }
        if let Some(memory) = lookup("IPREP_USE_MEMORY_STORE") {
            self.database.use_memory_store = memory
                .parse()
                .context("Invalid IPREP_USE_MEMORY_STORE value")?;
        }

        // Reputation configuration
        if let Some(baseline) = lookup("IPREP_VIOLATION_BASELINE") {
            self.reputation.violation_baseline = baseline
                .parse()
                .context("Invalid IPREP_VIOLATION_BASELINE value")?;
        }
        if let Some(penalty) = lookup("IPREP_DEFAULT_PENALTY") {
            self.reputation.default_penalty = penalty
                .parse()
                .context("Invalid IPREP_DEFAULT_PENALTY value")?;
        }
        if let Some(table) = lookup("IPREP_VIOLATION_PENALTIES") {
            self.reputation.violation_penalties = parse_penalty_table(&table)?;
        }
        if let Some(max) = lookup("IPREP_MAX_VIOLATION_ENTRIES") {
            self.reputation.max_violation_entries = max
                .parse()
                .context("Invalid IPREP_MAX_VIOLATION_ENTRIES value")?;
        }
        if let Some(rate) = lookup("IPREP_DECAY_RATE") {
            self.reputation.decay_rate = rate.parse().context("Invalid IPREP_DECAY_RATE value")?;
        }

        // Logging configuration
        if let Some(level) = lookup("IPREP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(log_requests) = lookup("IPREP_LOG_REQUESTS") {
            self.logging.log_requests = log_requests
                .parse()
                .context("Invalid IPREP_LOG_REQUESTS value")?;
        }
        if let Some(ms) = lookup("IPREP_SLOW_REQUEST_MS") {
            self.logging.slow_request_ms =
                ms.parse().context("Invalid IPREP_SLOW_REQUEST_MS value")?;
        }

        if let Some(size) = lookup("IPREP_MAX_REQUEST_SIZE") {
            self.http.max_request_size =
                size.parse().context("Invalid IPREP_MAX_REQUEST_SIZE value")?;
        }

        Ok(())
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if !self.database.use_memory_store && self.database.postgres_url.is_empty() {
            return Err(anyhow::anyhow!(
                "PostgreSQL URL is required unless the memory store is enabled"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Database max_connections must be non-zero"));
        }

        if self.database.store_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Store timeout must be non-zero"));
        }

        if self.reputation.violation_baseline > MAX_REPUTATION {
            return Err(anyhow::anyhow!(
                "Violation baseline {} is outside [0, {}]",
                self.reputation.violation_baseline,
                MAX_REPUTATION
            ));
        }

        for name in self.reputation.violation_penalties.keys() {
            validate_violation_name(name)
                .with_context(|| format!("Invalid violation name in penalty table: {:?}", name))?;
        }
        self.reputation.to_policy()?;

        if self.reputation.max_violation_entries == 0 {
            return Err(anyhow::anyhow!("max_violation_entries must be non-zero"));
        }

        validate_decay_rate(self.reputation.decay_rate).context("Invalid decay_rate")?;

        if self.http.max_request_size == 0 {
            return Err(anyhow::anyhow!("max_request_size must be non-zero"));
        }

        Ok(())
    }
}

/// Parse `name=points` pairs separated by commas, e.g. `spam:login=20,rate_limit=5`
fn parse_penalty_table(raw: &str) -> Result<BTreeMap<String, u8>> {
    let mut table = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, points) = pair
            .split_once('=')
            .with_context(|| format!("Invalid IPREP_VIOLATION_PENALTIES entry: {}", pair))?;
        let points: u8 = points
            .trim()
            .parse()
            .with_context(|| format!("Invalid penalty for {}", name.trim()))?;
        table.insert(name.trim().to_string(), points);
    }
    Ok(table)
}
