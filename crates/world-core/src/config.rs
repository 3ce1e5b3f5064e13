//! world.toml configuration parser.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest grace delay a node may hold after deregistration.
pub const MIN_GRACE_SECS: u64 = 5;

/// Errors produced while loading or validating a [`WorldConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub world: WorldSection,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub bind: BindConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Optional TOML file overriding the built-in message catalog.
    pub messages: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_address")]
    pub address: String,
    pub port: u16,
    pub server_group: String,
    pub session_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/worldgrid/world.redb"),
        }
    }
}

/// What to do when the coordination service cannot be reached at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFailurePolicy {
    /// Log and keep serving without a channel assignment.
    #[default]
    Degrade,
    /// Treat the node as failed and exit.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// gRPC endpoint of the coordination service, e.g. `127.0.0.1:6969`.
    /// Unset in standalone mode.
    pub endpoint: Option<String>,
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub on_register_failure: RegistrationFailurePolicy,
    /// Channels handed out per server group by the in-process coordinator.
    #[serde(default = "default_local_channels")]
    pub local_channels: u32,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_rpc_timeout_secs(),
            on_register_failure: RegistrationFailurePolicy::default(),
            local_channels: default_local_channels(),
        }
    }
}

impl CoordinationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindConfig {
    /// Upper bound on bind attempts. Unset means retry until a port is free.
    pub max_attempts: Option<u32>,
    /// Pause between attempts, in milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Countdown announced to players in the shutdown broadcast.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// Grace delay held after deregistration. Never below [`MIN_GRACE_SECS`].
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown_secs(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs.max(MIN_GRACE_SECS))
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_local_channels() -> u32 {
    16
}

fn default_countdown_secs() -> u32 {
    5
}

fn default_grace_secs() -> u64 {
    MIN_GRACE_SECS
}

impl WorldConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the scalars the bootstrap relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.server_group.trim().is_empty() {
            return Err(ConfigError::Invalid("world.server_group is empty".into()));
        }
        if self.world.session_limit == 0 {
            return Err(ConfigError::Invalid(
                "world.session_limit must be positive".into(),
            ));
        }
        if self.world.port == 0 {
            return Err(ConfigError::Invalid("world.port must be non-zero".into()));
        }
        if self.world.address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "world.address is not an IP address: {}",
                self.world.address
            )));
        }
        if self.coordination.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "coordination.timeout_secs must be positive".into(),
            ));
        }
        if self.shutdown.grace_secs < MIN_GRACE_SECS {
            return Err(ConfigError::Invalid(format!(
                "shutdown.grace_secs must be at least {MIN_GRACE_SECS}"
            )));
        }
        if self.bind.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "bind.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Session limit as a validated positive count.
    pub fn session_limit(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.world.session_limit)
            .ok_or_else(|| ConfigError::Invalid("world.session_limit must be positive".into()))
    }

    /// Scaffold a config for a local single-node setup.
    pub fn scaffold(server_group: &str, port: u16) -> Self {
        WorldConfig {
            world: WorldSection {
                address: default_address(),
                port,
                server_group: server_group.to_string(),
                session_limit: 500,
            },
            database: DatabaseConfig::default(),
            coordination: CoordinationConfig::default(),
            bind: BindConfig::default(),
            shutdown: ShutdownConfig::default(),
            messages: None,
        }
    }
}
