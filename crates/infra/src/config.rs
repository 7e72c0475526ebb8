//! Configuration loading.
//!
//! All settings come from the environment and are read once at startup.
//! See [`AppConfig::from_env`] for the variables and their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: expected {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub dispatch_interval: Duration,
    pub completion_interval: Duration,
    pub device_timeout: Duration,
    /// Successful assignments a single dispatcher tick may make.
    pub max_assignments_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(60),
            completion_interval: Duration::from_secs(120),
            device_timeout: Duration::from_secs(10),
            max_assignments_per_tick: 1,
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` selects the in-memory stores.
    pub database_url: Option<String>,
    /// JSON printers and queue loaded into the in-memory stores.
    pub seed_file: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// | variable | default |
    /// |----------|---------|
    /// | `DATABASE_URL` | unset (in-memory stores) |
    /// | `SEED_FILE` | unset (in-memory stores start empty) |
    /// | `DISPATCH_INTERVAL_SECS` | 60 |
    /// | `COMPLETION_INTERVAL_SECS` | 120 |
    /// | `DEVICE_TIMEOUT_SECS` | 10 |
    /// | `MAX_ASSIGNMENTS_PER_TICK` | 1 |
    /// | `BIND_ADDR` | `0.0.0.0:8080` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            dispatch_interval: secs(&lookup, "DISPATCH_INTERVAL_SECS", defaults.dispatch_interval)?,
            completion_interval: secs(
                &lookup,
                "COMPLETION_INTERVAL_SECS",
                defaults.completion_interval,
            )?,
            device_timeout: secs(&lookup, "DEVICE_TIMEOUT_SECS", defaults.device_timeout)?,
            max_assignments_per_tick: match non_blank(&lookup, "MAX_ASSIGNMENTS_PER_TICK") {
                Some(v) => positive(&v, "MAX_ASSIGNMENTS_PER_TICK")? as usize,
                None => defaults.max_assignments_per_tick,
            },
        };

        let bind_addr = match non_blank(&lookup, "BIND_ADDR") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                expected: "a socket address",
                value: v.clone(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        Ok(Self {
            database_url: non_blank(&lookup, "DATABASE_URL"),
            seed_file: non_blank(&lookup, "SEED_FILE").map(PathBuf::from),
            bind_addr,
            scheduler,
        })
    }
}

fn non_blank<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_blank(lookup, name) {
        Some(v) => Ok(Duration::from_secs(positive(&v, name)?)),
        None => Ok(default),
    }
}

fn positive(value: &str, name: &'static str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "a positive integer",
            value: value.to_string(),
        }),
    }
}
