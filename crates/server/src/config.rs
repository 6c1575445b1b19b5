use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use furrow_kernel::{WorldConfig, WorldConfigError};
use furrow_stream::{VisibilityConfig, VisibilityConfigError};
use serde::{Deserialize, Serialize};

use crate::queue::QueuePolicy;

/// Top-level server configuration. Every field has a default, so a config
/// file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    pub queue_policy: QueuePolicy,
    pub max_connections: usize,
    /// Frames buffered per client before new ones are dropped.
    pub outbox_capacity: usize,
    pub world: WorldConfig,
    pub visibility: VisibilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            tick_ms: 1000,
            queue_policy: QueuePolicy::FirstWins,
            max_connections: 256,
            outbox_capacity: 32,
            world: WorldConfig::default(),
            visibility: VisibilityConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    World(#[from] WorldConfigError),
    #[error(transparent)]
    Visibility(#[from] VisibilityConfigError),
    #[error("tick_ms must be positive")]
    TickPeriod,
    #[error("outbox_capacity must be positive")]
    Outbox,
}

impl ServerConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.visibility.validate()?;
        if self.tick_ms == 0 {
            return Err(ConfigError::TickPeriod);
        }
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Outbox);
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
