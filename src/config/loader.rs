//! Configuration loading functionality
//!
//! Loads configuration from JSON files, `PROXY_MUX_*` environment variables
//! or explicit arguments.

use std::env;
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::common::Result;
use crate::config::defaults::ENV_PREFIX;
use crate::config::error::ConfigError;
use crate::config::ProxyConfig;

/// Trait for loading configuration from different sources
pub trait ConfigLoader {
    /// Load configuration from a JSON file
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> where Self: Sized;

    /// Load configuration from environment variables
    fn from_env() -> Result<Self> where Self: Sized;

    /// Create configuration from explicit arguments
    fn from_args(listen: &str, allow_unprotected: bool, log_level: &str) -> Result<Self>
    where
        Self: Sized;
}

impl ConfigLoader for ProxyConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()).into());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e.to_string()))?;

        debug!("Loaded configuration file {}", path.display());
        let config = serde_json::from_str(&content).map_err(ConfigError::from)?;
        Ok(config)
    }

    fn from_env() -> Result<Self> {
        let get_env = |name: &str| -> Option<String> {
            env::var(format!("{}{}", ENV_PREFIX, name)).ok()
        };

        fn parse_num<T: std::str::FromStr>(
            name: &str,
            value: &str,
        ) -> std::result::Result<T, ConfigError> {
            value.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(name.to_lowercase(), format!("not a number: {}", value))
            })
        }

        let mut config = Self::default();

        if let Some(value) = get_env("LISTEN") {
            config.listen = value;
        }
        if let Some(value) = get_env("ALLOW_UNPROTECTED") {
            config.allow_unprotected =
                matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(value) = get_env("LOG_LEVEL") {
            config.log_level = value;
        }
        if let Some(value) = get_env("DETECT_TIMEOUT_MS") {
            config.detect_timeout_ms = parse_num("DETECT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get_env("CONNECT_TIMEOUT") {
            config.connect_timeout = parse_num("CONNECT_TIMEOUT", &value)?;
        }
        if let Some(value) = get_env("ACCEPT_QUEUE") {
            config.accept_queue = parse_num("ACCEPT_QUEUE", &value)?;
        }
        if let Some(value) = get_env("BACKLOG") {
            config.backlog = parse_num("BACKLOG", &value)?;
        }

        Ok(config)
    }

    fn from_args(listen: &str, allow_unprotected: bool, log_level: &str) -> Result<Self> {
        let config = Self {
            listen: listen.to_string(),
            allow_unprotected,
            log_level: log_level.to_string(),
            ..Self::default()
        };

        // Fail early on a bad address; everything else is checked by validate()
        if let Err(e) = config.listen_target() {
            warn!("Rejecting listen argument: {}", e);
            return Err(e);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ProxyError;
    use serial_test::serial;

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "listen": "alice:pw@0.0.0.0:1080", "log_level": "debug" }"#).unwrap();

        let config = ProxyConfig::from_file(&path).unwrap();
        assert_eq!(config.listen, "alice:pw@0.0.0.0:1080");
        assert_eq!(config.log_level, "debug");
        assert!(!config.allow_unprotected);
    }

    #[test]
    fn test_from_missing_file() {
        let result = ProxyConfig::from_file("definitely/not/here.json");
        assert!(matches!(result, Err(ProxyError::Config(_))));
    }

    #[test]
    fn test_from_args() {
        let config = ProxyConfig::from_args("127.0.0.1:0", true, "trace").unwrap();
        assert!(config.allow_unprotected);
        assert_eq!(config.log_level, "trace");

        let result = ProxyConfig::from_args("no-port", false, "info");
        assert!(matches!(result, Err(ProxyError::InvalidAddress(_))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("PROXY_MUX_LISTEN", "/tmp/mux.sock");
        env::set_var("PROXY_MUX_ALLOW_UNPROTECTED", "true");
        env::set_var("PROXY_MUX_ACCEPT_QUEUE", "16");

        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.listen, "/tmp/mux.sock");
        assert!(config.allow_unprotected);
        assert_eq!(config.accept_queue, 16);

        env::set_var("PROXY_MUX_ACCEPT_QUEUE", "many");
        assert!(ProxyConfig::from_env().is_err());

        env::remove_var("PROXY_MUX_LISTEN");
        env::remove_var("PROXY_MUX_ALLOW_UNPROTECTED");
        env::remove_var("PROXY_MUX_ACCEPT_QUEUE");
    }
}
