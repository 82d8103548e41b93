//! Configuration merging functionality
//!
//! This module provides functionality for merging configurations from different sources.

use crate::config::ProxyConfig;

/// Trait for merging configurations
pub trait ConfigMerger {
    /// Merge another configuration into this one
    ///
    /// Values from `other` will override values in `self` if they are not the default values.
    /// This is used to implement the configuration priority system.
    fn merge(&self, other: impl AsRef<Self>) -> Self where Self: Sized;
}

impl ConfigMerger for ProxyConfig {
    fn merge(&self, other: impl AsRef<Self>) -> Self {
        let other = other.as_ref();
        let default = Self::default();

        fn merge_field<T: Clone + PartialEq>(self_val: &T, other_val: &T, default_val: &T) -> T {
            if other_val != default_val {
                other_val.clone()
            } else {
                self_val.clone()
            }
        }

        Self {
            listen: merge_field(&self.listen, &other.listen, &default.listen),
            allow_unprotected: merge_field(
                &self.allow_unprotected,
                &other.allow_unprotected,
                &default.allow_unprotected,
            ),
            log_level: merge_field(&self.log_level, &other.log_level, &default.log_level),
            detect_timeout_ms: merge_field(
                &self.detect_timeout_ms,
                &other.detect_timeout_ms,
                &default.detect_timeout_ms,
            ),
            connect_timeout: merge_field(
                &self.connect_timeout,
                &other.connect_timeout,
                &default.connect_timeout,
            ),
            accept_queue: merge_field(
                &self.accept_queue,
                &other.accept_queue,
                &default.accept_queue,
            ),
            backlog: merge_field(&self.backlog, &other.backlog, &default.backlog),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_priority() {
        let file = ProxyConfig {
            listen: "0.0.0.0:1080".to_string(),
            log_level: "debug".to_string(),
            ..ProxyConfig::default()
        };
        let args = ProxyConfig {
            allow_unprotected: true,
            ..ProxyConfig::default()
        };

        let merged = file.merge(&args);
        assert_eq!(merged.listen, "0.0.0.0:1080");
        assert_eq!(merged.log_level, "debug");
        assert!(merged.allow_unprotected);
    }

    #[test]
    fn test_non_default_overrides() {
        let base = ProxyConfig {
            accept_queue: 4,
            ..ProxyConfig::default()
        };
        let over = ProxyConfig {
            accept_queue: 64,
            ..ProxyConfig::default()
        };
        assert_eq!(base.merge(over).accept_queue, 64);
    }
}
