//! Runtime configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured via `dotenvy`.
//! Every key has a default, so an empty environment yields a usable config.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default validity window of a generated pairing code (15 minutes).
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(15 * 60);

/// Default number of draws before code generation gives up on collisions.
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 16;

/// Default interval between own-presence republishes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Default capacity of the coordinator's event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings that shape the pairing state machine.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// How long a generated code stays redeemable.
    pub code_ttl: Duration,
    /// Collision re-draws allowed per generation.
    pub max_code_attempts: u32,
    /// Own-presence heartbeat; `None` disables it.
    pub heartbeat_interval: Option<Duration>,
    /// Buffered events per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            code_ttl: DEFAULT_CODE_TTL,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PairingConfig {
    /// Builder: set the code TTL.
    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Builder: set or disable the presence heartbeat.
    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Builder: set the collision retry limit.
    pub fn with_max_code_attempts(mut self, attempts: u32) -> Self {
        self.max_code_attempts = attempts;
        self
    }
}

/// Where the file-backed stores live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding this device's profile.
    pub data_dir: PathBuf,
    /// Directory shared by every device acting as the remote document store.
    pub shared_dir: PathBuf,
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub pairing: PairingConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PairingConfig::default();

        let code_ttl = parse_optional::<u64>(&lookup, "IWBH_CODE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.code_ttl);
        if code_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "IWBH_CODE_TTL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let max_code_attempts = parse_optional::<u32>(&lookup, "IWBH_MAX_CODE_ATTEMPTS")?
            .unwrap_or(defaults.max_code_attempts)
            .max(1);

        let heartbeat_interval = match parse_optional::<u64>(&lookup, "IWBH_HEARTBEAT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.heartbeat_interval,
        };

        let event_capacity = parse_optional::<usize>(&lookup, "IWBH_EVENT_CAPACITY")?
            .unwrap_or(defaults.event_capacity)
            .max(1);

        let data_dir = match lookup("IWBH_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let shared_dir = match lookup("IWBH_SHARED_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => data_dir.join("shared"),
        };

        Ok(Self {
            pairing: PairingConfig {
                code_ttl,
                max_code_attempts,
                heartbeat_interval,
                event_capacity,
            },
            storage: StorageConfig {
                data_dir,
                shared_dir,
            },
        })
    }
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".iwbh"))
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "IWBH_DATA_DIR".to_string(),
            hint: "No home directory found; set IWBH_DATA_DIR explicitly.".to_string(),
        })
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{:?}: {}", raw, e),
                })
        }
        _ => Ok(None),
    }
}
