//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! shutdown timing, health probe budgets, logging, and default paths.
//! `AppConfig` is the root configuration struct containing all settings.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Shutdown Timing
// =============================================================================

/// Hard budget for the whole shutdown sequence before termination is forced
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Fixed wait, still serving, so load balancers can observe not-ready and deregister
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;

// =============================================================================
// Health Probes
// =============================================================================

/// Upper bound for a single dependency round-trip during aggregation
pub const DEFAULT_CHECK_TIMEOUT_MS: u64 = 2_000;

/// Probe endpoint paths
pub const LIVENESS_PATH: &str = "/health/live";
pub const READINESS_PATH: &str = "/health/ready";
pub const HEALTH_PATH: &str = "/health";

/// Probe responses must never be served from an intermediate cache
pub const CACHE_CONTROL_PROBE: &str = "no-store";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "user_service=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default deployment environment label
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default prefix for the resource API
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration
    pub http: HttpServerConfig,
    #[serde(default)]
    pub app: ApplicationConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub health: HealthConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// External dependencies probed for readiness and torn down on shutdown
    #[serde(default)]
    pub dependency: Vec<DependencyConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Environment label reported by the health endpoints
    #[serde(default = "ApplicationConfig::default_environment")]
    pub environment: String,
    #[serde(default = "ApplicationConfig::default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            environment: Self::default_environment(),
            api_prefix: Self::default_api_prefix(),
        }
    }
}

impl ApplicationConfig {
    fn default_environment() -> String {
        DEFAULT_ENVIRONMENT.to_string()
    }

    fn default_api_prefix() -> String {
        DEFAULT_API_PREFIX.to_string()
    }
}

/// Shutdown sequence timing
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Hard deadline for the whole sequence in milliseconds
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_ms: u64,
    /// Grace period between the trigger and draining the listener in milliseconds
    #[serde(default = "ShutdownConfig::default_grace_period")]
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout(),
            grace_period_ms: Self::default_grace_period(),
        }
    }
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        DEFAULT_SHUTDOWN_TIMEOUT_MS
    }

    fn default_grace_period() -> u64 {
        DEFAULT_GRACE_PERIOD_MS
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Per-dependency check budget in milliseconds
    #[serde(default = "HealthConfig::default_check_timeout")]
    pub check_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: Self::default_check_timeout(),
        }
    }
}

impl HealthConfig {
    fn default_check_timeout() -> u64 {
        DEFAULT_CHECK_TIMEOUT_MS
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Kind of adapter used to reach a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// PostgreSQL database, probed with `SELECT 1`
    Postgres,
    /// Any TCP endpoint, probed with a connect
    Tcp,
}

/// Configuration for a single dependency
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    /// Name used as the key in health reports and in logs
    pub name: String,
    pub kind: DependencyKind,
    /// Connection URL (postgres)
    pub url: Option<String>,
    /// host:port (tcp)
    pub address: Option<String>,
    /// Whether an unavailable dependency makes the service unhealthy (default: true)
    #[serde(default = "DependencyConfig::default_required")]
    pub required: bool,
}

impl DependencyConfig {
    fn default_required() -> bool {
        true
    }

    /// Connection target for this dependency's kind, if one is configured
    pub fn target(&self) -> Option<&str> {
        match self.kind {
            DependencyKind::Postgres => self.url.as_deref(),
            DependencyKind::Tcp => self.address.as_deref(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "shutdown.timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.shutdown.grace_period_ms >= self.shutdown.timeout_ms {
            return Err(ConfigError::Validation(format!(
                "shutdown.grace_period_ms ({}) must be below shutdown.timeout_ms ({})",
                self.shutdown.grace_period_ms, self.shutdown.timeout_ms
            )));
        }

        if !self.app.api_prefix.starts_with('/') || overlaps_path(&self.app.api_prefix, HEALTH_PATH) {
            return Err(ConfigError::Validation(format!(
                "app.api_prefix must start with '/' and not overlap {}: {}",
                HEALTH_PATH, self.app.api_prefix
            )));
        }

        if self.health.check_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "health.check_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for dependency in &self.dependency {
            if !names.insert(dependency.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate dependency name: {}",
                    dependency.name
                )));
            }
            // A mandatory dependency with nowhere to connect can never become ready
            if dependency.required && dependency.target().is_none() {
                return Err(ConfigError::Validation(format!(
                    "Required dependency '{}' has no connection target",
                    dependency.name
                )));
            }
        }

        Ok(())
    }
}

/// Whether `path` is `base` or lies beneath it, comparing whole segments.
fn overlaps_path(path: &str, base: &str) -> bool {
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
