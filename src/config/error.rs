//! Configuration errors

use std::path::PathBuf;

use thiserror::Error;

use crate::common::ProxyError;

/// Problems loading or checking a `ProxyConfig`
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Config file exists but could not be read
    #[error("Error reading configuration file {}: {}", .0.display(), .1)]
    FileReadError(PathBuf, String),

    /// Config file is not valid JSON for `ProxyConfig`
    #[error("Error parsing configuration: {0}")]
    ParseError(String),

    /// A field (or its `PROXY_MUX_*` variable) holds an unusable value
    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for ProxyError {
    fn from(err: ConfigError) -> Self {
        ProxyError::Config(err.to_string())
    }
}
