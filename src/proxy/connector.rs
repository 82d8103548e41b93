//! Outbound connectors
//!
//! Both protocol handlers share one [`Connector`]. The SOCKS side gets it
//! wrapped in [`SocksErrorConnector`] so dial failures come back as SOCKS
//! reply codes instead of raw I/O errors.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{ProxyError, Result};
use crate::config::ProxyConfig;

/// Opens outbound connections to the proxy's final destination
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by this connector
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Connect to `host:port`
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connector with a connect timeout
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::defaults::connect_timeout()))
    }
}

impl TcpConnector {
    /// Create a connector that gives up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create a connector using the configured connect timeout
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.connect_timeout())
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        let limit = self.timeout;

        async move {
            let stream = timeout(limit, TcpStream::connect((host.as_str(), port)))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Connection timed out"))??;
            stream.set_nodelay(true)?;
            debug!("Connected to {}:{}", host, port);
            Ok(stream)
        }
    }
}

/// SOCKS5 reply codes for failed requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocksReply {
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    NotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired (used for timeouts)
    TtlExpired = 0x06,
}

impl SocksReply {
    /// SOCKS4 `CD` byte for any failure; SOCKS4 has no finer-grained codes
    pub const SOCKS4_REJECTED: u8 = 0x5B;

    /// Map a connector error to the reply a SOCKS client should see
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::HostUnreachable => Self::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => Self::NetworkUnreachable,
            io::ErrorKind::TimedOut => Self::TtlExpired,
            io::ErrorKind::PermissionDenied => Self::NotAllowed,
            _ => Self::GeneralFailure,
        }
    }

    /// SOCKS5 `REP` byte
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SocksReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GeneralFailure => "general failure",
            Self::NotAllowed => "connection not allowed",
            Self::NetworkUnreachable => "network unreachable",
            Self::HostUnreachable => "host unreachable",
            Self::ConnectionRefused => "connection refused",
            Self::TtlExpired => "TTL expired",
        };
        write!(f, "{} ({:#04x})", text, self.code())
    }
}

/// Connector wrapper for the SOCKS path
///
/// Shares the inner connector with the HTTP path.
pub struct SocksErrorConnector<C> {
    inner: Arc<C>,
}

impl<C> Clone for SocksErrorConnector<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Connector> SocksErrorConnector<C> {
    /// Wrap a shared connector
    pub fn new(inner: Arc<C>) -> Self {
        Self { inner }
    }

    /// The wrapped connector
    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    /// Connect, translating failures into [`ProxyError::Connect`]
    pub async fn connect(&self, host: &str, port: u16) -> Result<C::Stream> {
        self.inner.connect(host, port).await.map_err(|source| {
            let reply = SocksReply::from_io_error(&source);
            debug!("Connect to {}:{} failed, replying {}", host, port, reply);
            ProxyError::Connect { reply, source }
        })
    }
}
