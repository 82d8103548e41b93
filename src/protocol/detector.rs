//! Protocol detector implementation
//!
//! This module implements protocol detection by examining the first bytes of
//! a connection. Unlike a socket `peek`, the bytes are actually read (so any
//! stream type works, Unix sockets included) and then pushed back in front
//! of the stream with a [`PrefixedStream`].

use std::fmt;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::common::{PrefixedStream, ProxyError, Result};

/// SOCKS protocol version byte
pub const SOCKS4_VERSION: u8 = 0x04;
/// SOCKS protocol version byte
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocksVersion {
    /// SOCKS4 / SOCKS4a, no authentication negotiation
    V4,
    /// SOCKS5
    V5,
}

/// Protocol spoken by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// HTTP proxy traffic (ASCII request line)
    Http,
    /// SOCKS traffic
    Socks(SocksVersion),
}

impl Protocol {
    /// Short protocol name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Socks(SocksVersion::V4) => "SOCKS4",
            Self::Socks(SocksVersion::V5) => "SOCKS5",
        }
    }

    /// Whether this connection goes to the SOCKS listener
    pub fn is_socks(&self) -> bool {
        matches!(self, Self::Socks(_))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protocol detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionResult {
    /// Protocol determined
    Detected(Protocol),
    /// Need more data to determine protocol
    NeedMoreData,
}

/// Protocol detector trait
///
/// Classifies the leading bytes of a stream. Implementations must be pure:
/// the same bytes always give the same answer.
pub trait ProtocolDetector: Send + Sync {
    /// Inspect the bytes read so far
    fn check_protocol(&self, data: &[u8]) -> DetectionResult;

    /// Upper bound on bytes this detector may ask for
    fn max_bytes(&self) -> usize;
}

/// SOCKS-versus-HTTP detector
///
/// The first byte is enough: SOCKS requests start with their version byte,
/// anything else is treated as an HTTP request line.
#[derive(Debug, Clone, Default)]
pub struct SocksDetector;

impl ProtocolDetector for SocksDetector {
    fn check_protocol(&self, data: &[u8]) -> DetectionResult {
        let Some(&first) = data.first() else {
            return DetectionResult::NeedMoreData;
        };

        let protocol = match first {
            SOCKS4_VERSION => Protocol::Socks(SocksVersion::V4),
            SOCKS5_VERSION => Protocol::Socks(SocksVersion::V5),
            _ => Protocol::Http,
        };
        trace!("First byte {:#04x} classified as {}", first, protocol);
        DetectionResult::Detected(protocol)
    }

    fn max_bytes(&self) -> usize {
        1
    }
}

/// Reads just enough of a stream to classify it, then hands it back intact
#[derive(Debug, Clone)]
pub struct Sniffer<D = SocksDetector> {
    detector: D,
    timeout: Option<Duration>,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new(SocksDetector)
    }
}

impl<D: ProtocolDetector> Sniffer<D> {
    /// Create a sniffer around a detector, without a timeout
    pub fn new(detector: D) -> Self {
        Self { detector, timeout: None }
    }

    /// Give up on clients that send nothing within `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a stream
    ///
    /// Returns the protocol and a stream whose first reads replay the bytes
    /// consumed here. Fails with `ClassificationFailure` when the stream
    /// ends, errors or times out before a decision.
    pub async fn classify<S>(&self, stream: S) -> Result<(Protocol, PrefixedStream<S>)>
    where
        S: AsyncRead + Unpin,
    {
        match self.timeout {
            Some(limit) => timeout(limit, self.read_until_detected(stream))
                .await
                .map_err(|_| {
                    debug!("Timeout waiting for protocol data");
                    ProxyError::ClassificationFailure(format!(
                        "no data within {} ms",
                        limit.as_millis()
                    ))
                })?,
            None => self.read_until_detected(stream).await,
        }
    }

    async fn read_until_detected<S>(&self, mut stream: S) -> Result<(Protocol, PrefixedStream<S>)>
    where
        S: AsyncRead + Unpin,
    {
        let max = self.detector.max_bytes().max(1);
        let mut buf = BytesMut::with_capacity(max);

        loop {
            if let DetectionResult::Detected(protocol) = self.detector.check_protocol(&buf) {
                return Ok((protocol, PrefixedStream::new(buf.freeze(), stream)));
            }
            if buf.len() >= max {
                return Err(ProxyError::ClassificationFailure(format!(
                    "undecided after {} bytes",
                    buf.len()
                )));
            }

            let mut chunk = vec![0u8; max - buf.len()];
            let n = stream.read(&mut chunk).await.map_err(|e| {
                debug!("Error reading protocol data: {}", e);
                ProxyError::ClassificationFailure(e.to_string())
            })?;
            if n == 0 {
                return Err(ProxyError::ClassificationFailure(format!(
                    "connection closed after {} bytes",
                    buf.len()
                )));
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}
