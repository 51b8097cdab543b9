use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {0}: {1}")]
    FileIo(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse {0}: {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),
    #[error("Invalid target address {0:?}")]
    Target(String),
    #[error("Missing required field: {0} (pass it on the command line or in the config file)")]
    Missing(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("Invalid log filter {0:?}")]
    LogFilter(String),
}
