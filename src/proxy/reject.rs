//! Protocol-appropriate refusals for denied connections

use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::common::Result;
use crate::protocol::{Protocol, SocksVersion};
use super::connection::Connection;
use super::connector::SocksReply;

/// SOCKS5 method selection: no acceptable methods
const SOCKS5_NO_METHODS: &[u8] = &[0x05, 0xFF];

/// SOCKS4 reply: request rejected or failed
const SOCKS4_REFUSAL: &[u8] = &[
    0x00,
    SocksReply::SOCKS4_REJECTED,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const HTTP_FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\
Content-Type: text/plain\r\n\
Content-Length: 10\r\n\
Connection: close\r\n\
\r\n\
Forbidden\n";

/// How long to keep reading after the refusal so the client sees it
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on bytes discarded while draining
const DRAIN_LIMIT: usize = 64 * 1024;

/// Bytes sent to a denied client of `protocol`
pub fn refusal(protocol: Protocol) -> &'static [u8] {
    match protocol {
        Protocol::Socks(SocksVersion::V5) => SOCKS5_NO_METHODS,
        Protocol::Socks(SocksVersion::V4) => SOCKS4_REFUSAL,
        Protocol::Http => HTTP_FORBIDDEN,
    }
}

/// Refuse a connection and close it
///
/// Closing with unread input pending can turn into a reset that discards
/// the reply, so the remaining input is drained for a short while first.
pub async fn reject(conn: Connection) -> Result<()> {
    let protocol = conn.protocol();
    let peer = conn.peer().clone();
    let mut stream = conn.into_stream();

    stream.write_all(refusal(protocol)).await?;
    stream.flush().await?;
    if let Err(e) = stream.shutdown().await {
        trace!("Shutdown after refusal to {} failed: {}", peer, e);
    }

    let mut buf = [0u8; 4096];
    let mut drained = 0;
    let drain = async {
        while drained < DRAIN_LIMIT {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => drained += n,
            }
        }
    };
    if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        trace!("Drain timed out for {}", peer);
    }

    debug!("Refused {} connection from {}", protocol, peer);
    Ok(())
}
