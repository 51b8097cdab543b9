use crate::config::ConfigError;
use crate::proxy::NetworkAddr;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BUFFER_SIZE: usize = 8192;
pub const DEFAULT_IDLE_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_MAX_CONNECTIONS: usize = 4096;

/// On-disk configuration. CLI flags take precedence over these values.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RawRelayCfg {
    pub listen: Option<SocketAddr>,
    pub target: Option<String>,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_idle_timeout_sec")]
    pub idle_timeout_sec: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_idle_timeout_sec() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SEC
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for RawRelayCfg {
    fn default() -> Self {
        Self {
            listen: None,
            target: None,
            buffer_size: default_buffer_size(),
            idle_timeout_sec: default_idle_timeout_sec(),
            max_connections: default_max_connections(),
        }
    }
}

/// Per-endpoint socket profile shared by every connection.
#[derive(Debug, Clone, Copy)]
pub struct SocketTuning {
    pub buffer_size: usize,
    pub idle_timeout: Duration,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub target: NetworkAddr,
    pub tuning: SocketTuning,
    pub max_connections: usize,
}

impl RelayConfig {
    /// Merge the optional config file with CLI overrides and validate.
    pub fn load(
        file: Option<&Path>,
        listen: Option<SocketAddr>,
        target: Option<NetworkAddr>,
    ) -> Result<Self, ConfigError> {
        let raw = match file {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::FileIo(path.to_path_buf(), e))?;
                serde_yaml::from_str::<RawRelayCfg>(&content)
                    .map_err(|e| ConfigError::Yaml(path.to_path_buf(), e))?
            }
            None => RawRelayCfg::default(),
        };
        Self::resolve(raw, listen, target)
    }

    fn resolve(
        raw: RawRelayCfg,
        listen: Option<SocketAddr>,
        target: Option<NetworkAddr>,
    ) -> Result<Self, ConfigError> {
        let listen = listen.or(raw.listen).ok_or(ConfigError::Missing("listen"))?;
        let target = match target {
            Some(t) => t,
            None => {
                let value = raw.target.ok_or(ConfigError::Missing("target"))?;
                value
                    .parse()
                    .map_err(|_| ConfigError::Target(value.clone()))?
            }
        };
        if raw.buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "buffer_size",
                reason: "must be positive",
            });
        }
        if raw.idle_timeout_sec == 0 {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_sec",
                reason: "must be positive",
            });
        }
        if raw.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "max_connections",
                reason: "must be positive",
            });
        }
        Ok(Self {
            listen,
            target,
            tuning: SocketTuning {
                buffer_size: raw.buffer_size,
                idle_timeout: Duration::from_secs(raw.idle_timeout_sec),
            },
            max_connections: raw.max_connections,
        })
    }
}
