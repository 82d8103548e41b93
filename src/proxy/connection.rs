//! Classified client connection

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::common::{BoxedStream, PeerAddr, PrefixedStream};
use crate::protocol::Protocol;

/// A client connection routed to one protocol handler
///
/// Reading from it yields exactly the bytes the client sent, starting with
/// whatever the sniffer consumed to classify it.
pub struct Connection {
    protocol: Protocol,
    peer: PeerAddr,
    stream: PrefixedStream<BoxedStream>,
}

impl Connection {
    /// Assemble a connection from a classified stream
    pub fn new(protocol: Protocol, peer: PeerAddr, stream: PrefixedStream<BoxedStream>) -> Self {
        Self { protocol, peer, stream }
    }

    /// Protocol detected on this connection
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Remote endpoint
    pub fn peer(&self) -> &PeerAddr {
        &self.peer
    }

    /// Unwrap into the replaying stream
    pub fn into_stream(self) -> PrefixedStream<BoxedStream> {
        self.stream
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &self.protocol)
            .field("peer", &self.peer)
            .field("buffered", &self.stream.buffered().len())
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
