//! Configuration module
//!
//! This module handles application configuration: loading it from files,
//! environment variables and explicit arguments, merging the sources and
//! validating the result. The listening address grammar lives in
//! [`listen`].

// Submodules
pub mod defaults;
mod error;
pub mod listen;
mod loader;
mod merger;
mod validator;

// Re-export types and traits
pub use self::defaults::ENV_PREFIX;
pub use self::error::ConfigError;
pub use self::listen::{BindAddress, ListenTarget};
pub use self::loader::ConfigLoader;
pub use self::merger::ConfigMerger;
pub use self::validator::ConfigValidator;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Proxy configuration
///
/// Contains everything needed to start the multiplexed listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct ProxyConfig {
    // --- Network settings ---

    /// Listening address (`[user:pass@]host:port` or `[user:pass@]/path`)
    #[serde(default = "defaults::listen")]
    pub listen: String,

    /// Serve non-local clients without credentials
    #[serde(default = "defaults::allow_unprotected")]
    pub allow_unprotected: bool,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// How long to wait for a client's first byte, in milliseconds
    /// 0 waits until the client sends or closes
    #[serde(default = "defaults::detect_timeout_ms")]
    pub detect_timeout_ms: u64,

    /// Outbound connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout: u64,

    /// Pending-accept queue size of each virtual listener
    #[serde(default = "defaults::accept_queue")]
    pub accept_queue: usize,

    /// Listen backlog of the real TCP socket
    #[serde(default = "defaults::backlog")]
    pub backlog: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            allow_unprotected: defaults::allow_unprotected(),
            log_level: defaults::log_level(),
            detect_timeout_ms: defaults::detect_timeout_ms(),
            connect_timeout: defaults::connect_timeout(),
            accept_queue: defaults::accept_queue(),
            backlog: defaults::backlog(),
        }
    }
}

impl AsRef<ProxyConfig> for ProxyConfig {
    fn as_ref(&self) -> &ProxyConfig {
        self
    }
}

impl ProxyConfig {
    /// Protocol detection timeout, `None` when disabled
    pub fn detect_timeout(&self) -> Option<Duration> {
        match self.detect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Outbound connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Parse the listening address
    pub fn listen_target(&self) -> crate::common::Result<ListenTarget> {
        ListenTarget::parse(&self.listen)
    }
}
