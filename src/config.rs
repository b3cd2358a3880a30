//! Configuration management for Windowguard.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::error::{Result, WindowGuardError};

/// Main configuration for the Windowguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Deployment environment. Controls how much error detail reaches clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Take the client identifier from `X-Forwarded-For` when present.
    /// Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            trust_forwarded_for: false,
            environment: Environment::default(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// How stale client windows are pruned from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStrategy {
    /// Sweep with a fixed probability on each request
    #[default]
    Probabilistic,
    /// Sweep from a background task on a fixed interval
    Periodic,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Length of the trailing window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum admitted requests per client within the window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Registry cleanup strategy
    #[serde(default)]
    pub cleanup: CleanupStrategy,

    /// Per-request sweep probability for the probabilistic strategy
    #[serde(default = "default_cleanup_probability")]
    pub cleanup_probability: f64,

    /// Sweep interval in seconds for the periodic strategy
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            cleanup: CleanupStrategy::default(),
            cleanup_probability: default_cleanup_probability(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> usize {
    100
}

fn default_cleanup_probability() -> f64 {
    0.01
}

fn default_sweep_interval() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl GuardConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| WindowGuardError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;

        if rl.window_ms == 0 {
            return Err(WindowGuardError::Config("window_ms must be greater than zero".into()));
        }
        if rl.max_requests == 0 {
            return Err(WindowGuardError::Config("max_requests must be greater than zero".into()));
        }
        if !(0.0..=1.0).contains(&rl.cleanup_probability) {
            return Err(WindowGuardError::Config(format!(
                "cleanup_probability must be within [0, 1], got {}",
                rl.cleanup_probability
            )));
        }
        if rl.sweep_interval_secs == 0 {
            return Err(WindowGuardError::Config(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
