//! Configuration module for netwatch.
//!
//! Loads a JSON configuration file, applies environment variable overrides
//! and validates the result. The configuration is read once at startup and
//! passed down by value; nothing reloads it.

use serde::Deserialize;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::classify::Thresholds;
use crate::log::Target;

/// Configuration file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "netwatch.json";

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub network: NetworkConfig,
    pub thresholds: Thresholds,
    pub view: ViewConfig,
}

/// Probing targets, log location and sampling cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address probed as ROUTER (default: "192.168.0.1")
    pub router_address: String,
    /// Address probed as INTERNET (default: "8.8.8.8")
    pub internet_address: String,
    /// Directory holding the daily logs (default: "monitoring")
    pub log_dir: PathBuf,
    /// Daily log file name prefix (default: "network_log")
    pub log_prefix: String,
    /// Echo requests per probe (default: 5)
    pub probe_count: u32,
    /// Milliseconds between echo requests (default: 200)
    pub probe_interval_ms: u64,
    /// Upper bound on one probe run in seconds (default: 10)
    pub probe_timeout_secs: u64,
    /// Probing executable (default: "fping")
    pub probe_command: String,
    /// Seconds to sleep after a cycle where both targets were OK (default: 60)
    pub interval_ok: u64,
    /// Seconds to sleep after any other cycle (default: 5)
    pub interval_problem: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            router_address: "192.168.0.1".to_string(),
            internet_address: "8.8.8.8".to_string(),
            log_dir: PathBuf::from("monitoring"),
            log_prefix: "network_log".to_string(),
            probe_count: 5,
            probe_interval_ms: 200,
            probe_timeout_secs: 10,
            probe_command: "fping".to_string(),
            interval_ok: 60,
            interval_problem: 5,
        }
    }
}

impl NetworkConfig {
    pub fn address(&self, target: Target) -> &str {
        match target {
            Target::Router => &self.router_address,
            Target::Internet => &self.internet_address,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn interval_ok(&self) -> Duration {
        Duration::from_secs(self.interval_ok)
    }

    pub fn interval_problem(&self) -> Duration {
        Duration::from_secs(self.interval_problem)
    }
}

/// Settings of the live status view.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Seconds between redraws (default: 5)
    pub refresh_seconds: u64,
    /// Rows per target used for averages (default: 100)
    pub history_entries: usize,
    /// Rows per target listed individually (default: 5)
    pub recent_entries: usize,
    /// Optional speedtest log whose last lines are shown
    pub speedtest_log: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            refresh_seconds: 5,
            history_entries: 100,
            recent_entries: 5,
            speedtest_log: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// A missing file yields the defaults. Environment variables:
    /// - `NETWATCH_ROUTER_ADDRESS`, `NETWATCH_INTERNET_ADDRESS`
    /// - `NETWATCH_LOG_DIR`, `NETWATCH_LOG_PREFIX`
    /// - `NETWATCH_PROBE_COUNT`, `NETWATCH_PROBE_INTERVAL_MS`,
    ///   `NETWATCH_PROBE_TIMEOUT_SECS`, `NETWATCH_PROBE_COMMAND`
    /// - `NETWATCH_INTERVAL_OK`, `NETWATCH_INTERVAL_PROBLEM`
    /// - `NETWATCH_LATENCY_WARN_MS`, `NETWATCH_LOSS_WARN_PERCENT`,
    ///   `NETWATCH_LOSS_CRITICAL_PERCENT`
    /// - `NETWATCH_SPEEDTEST_LOG`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = match fs::read_to_string(path) {
            Ok(data) => Self::from_json(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        cfg.apply_overrides(|key| env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let net = &mut self.network;
        override_with(&lookup, "NETWATCH_ROUTER_ADDRESS", &mut net.router_address);
        override_with(&lookup, "NETWATCH_INTERNET_ADDRESS", &mut net.internet_address);
        override_with(&lookup, "NETWATCH_LOG_DIR", &mut net.log_dir);
        override_with(&lookup, "NETWATCH_LOG_PREFIX", &mut net.log_prefix);
        override_with(&lookup, "NETWATCH_PROBE_COUNT", &mut net.probe_count);
        override_with(&lookup, "NETWATCH_PROBE_INTERVAL_MS", &mut net.probe_interval_ms);
        override_with(&lookup, "NETWATCH_PROBE_TIMEOUT_SECS", &mut net.probe_timeout_secs);
        override_with(&lookup, "NETWATCH_PROBE_COMMAND", &mut net.probe_command);
        override_with(&lookup, "NETWATCH_INTERVAL_OK", &mut net.interval_ok);
        override_with(&lookup, "NETWATCH_INTERVAL_PROBLEM", &mut net.interval_problem);

        let th = &mut self.thresholds;
        override_with(&lookup, "NETWATCH_LATENCY_WARN_MS", &mut th.latency_warn_ms);
        override_with(&lookup, "NETWATCH_LOSS_WARN_PERCENT", &mut th.loss_warn_percent);
        override_with(&lookup, "NETWATCH_LOSS_CRITICAL_PERCENT", &mut th.loss_critical_percent);

        if let Some(path) = lookup("NETWATCH_SPEEDTEST_LOG") {
            self.view.speedtest_log = Some(PathBuf::from(path));
        }
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let net = &self.network;
        if net.router_address.trim().is_empty() || net.internet_address.trim().is_empty() {
            return Err(ConfigError::Invalid("target addresses must not be empty".into()));
        }
        if net.log_prefix.is_empty() {
            return Err(ConfigError::Invalid("log_prefix must not be empty".into()));
        }
        if net.probe_command.trim().is_empty() {
            return Err(ConfigError::Invalid("probe_command must not be empty".into()));
        }
        if net.probe_count == 0 {
            return Err(ConfigError::Invalid("probe_count must be at least 1".into()));
        }
        if net.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("probe_timeout_secs must be positive".into()));
        }
        if net.interval_ok == 0 || net.interval_problem == 0 {
            return Err(ConfigError::Invalid(
                "interval_ok and interval_problem must be positive".into(),
            ));
        }

        let latency = self.thresholds.latency_warn_ms;
        if !latency.is_finite() || latency < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "latency_warn_ms must be a non-negative number, got {}",
                latency
            )));
        }

        if self.view.refresh_seconds == 0 {
            return Err(ConfigError::Invalid("refresh_seconds must be positive".into()));
        }
        Ok(())
    }
}

fn override_with<T, F>(lookup: &F, key: &str, slot: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring {}: cannot parse {:?}", key, raw),
        }
    }
}
