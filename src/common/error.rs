//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

use crate::proxy::SocksReply;

/// Proxy multiplexer error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Listening address could not be parsed
    #[error("Invalid listening address: {0}")]
    InvalidAddress(String),

    /// The real listening socket could not be opened
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Connection ended before its protocol could be determined
    #[error("Protocol classification failed: {0}")]
    ClassificationFailure(String),

    /// Connection was refused by the trust policy or presented bad credentials
    #[error("Authentication denied: {0}")]
    AuthenticationDenied(String),

    /// Outbound connection failed, carrying the SOCKS reply it maps to
    #[error("Outbound connection failed ({reply}): {source}")]
    Connect {
        /// SOCKS reply code for this failure
        reply: SocksReply,
        /// Underlying connector error
        #[source]
        source: io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl ProxyError {
    /// Whether this error only concerns a single connection
    ///
    /// Listener-level errors (`InvalidAddress`, `Bind`) are the only ones
    /// returned from `listen`; everything else is logged and dropped.
    pub fn is_per_connection(&self) -> bool {
        !matches!(self, Self::InvalidAddress(_) | Self::Bind { .. } | Self::Config(_))
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
