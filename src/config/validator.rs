//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;

use crate::common::{is_local_host, Result};
use crate::config::error::ConfigError;
use crate::config::{BindAddress, ProxyConfig};

/// Configuration validator trait
pub trait ConfigValidator {
    /// Reject configurations that cannot start
    fn validate(&self) -> Result<()>;

    /// Check configuration for warnings
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for ProxyConfig {
    fn validate(&self) -> Result<()> {
        // Network settings
        self.listen_target()?;

        // General settings
        match self.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => {
                warn!("Invalid log level: {}. Using default: info", level);
            }
        }

        if self.accept_queue == 0 {
            return Err(ConfigError::InvalidValue(
                "accept_queue".to_string(),
                "Accept queue must be greater than 0".to_string(),
            ).into());
        }

        if self.backlog == 0 {
            return Err(ConfigError::InvalidValue(
                "backlog".to_string(),
                "Backlog must be greater than 0".to_string(),
            ).into());
        }

        if self.connect_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "connect_timeout".to_string(),
                "Connect timeout must be greater than 0".to_string(),
            ).into());
        }

        Ok(())
    }

    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => {
                warnings.push(format!("Invalid log level '{}', using default 'info'", level));
            }
        }

        if let Ok(target) = self.listen_target() {
            if let BindAddress::Tcp { host, .. } = target.bind() {
                let exposed = !is_local_host(host);
                if self.allow_unprotected && target.credentials().is_none() && exposed {
                    warnings.push(format!(
                        "Listening on {} without credentials and unprotected mode enabled; \
                         any client that can reach it may use the proxy",
                        target.bind()
                    ));
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default() {
        assert!(ProxyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ProxyConfig { listen: "nope".to_string(), ..ProxyConfig::default() };
        assert!(config.validate().is_err());

        let config = ProxyConfig { accept_queue: 0, ..ProxyConfig::default() };
        assert!(config.validate().is_err());

        let config = ProxyConfig { backlog: 0, ..ProxyConfig::default() };
        assert!(config.validate().is_err());

        let config = ProxyConfig { connect_timeout: 0, ..ProxyConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_only_warns() {
        let config = ProxyConfig { log_level: "loud".to_string(), ..ProxyConfig::default() };
        assert!(config.validate().is_ok());

        let warnings = config.check_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("loud"));
    }

    #[test]
    fn test_exposed_listener_warning() {
        let config = ProxyConfig {
            listen: "0.0.0.0:8080".to_string(),
            allow_unprotected: true,
            ..ProxyConfig::default()
        };
        assert_eq!(config.check_warnings().len(), 1);

        let config = ProxyConfig {
            listen: "alice:pw@0.0.0.0:8080".to_string(),
            allow_unprotected: true,
            ..ProxyConfig::default()
        };
        assert!(config.check_warnings().is_empty());

        let config = ProxyConfig {
            listen: "0.0.0.0:8080".to_string(),
            ..ProxyConfig::default()
        };
        assert!(config.check_warnings().is_empty());
    }
}
