//! Listening sockets
//!
//! The one real socket (TCP or Unix) and the two virtual listeners fed from
//! it. Closing is shared: whichever side closes first wins, later closes are
//! no-ops, and only the accept loop ever drops the real socket.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{lookup_host, TcpListener, TcpSocket};
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};

use crate::common::{BoxedStream, PeerAddr, ProxyError, Result};
use crate::config::BindAddress;
use super::connection::Connection;

/// Address the real socket ended up bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddr {
    /// TCP socket address, with any ephemeral port resolved
    Tcp(SocketAddr),
    /// Unix socket path
    Unix(PathBuf),
}

impl BoundAddr {
    /// TCP address, if bound over TCP
    pub fn as_tcp(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(addr) => Some(*addr),
            Self::Unix(_) => None,
        }
    }

    /// TCP port, if bound over TCP
    pub fn port(&self) -> Option<u16> {
        self.as_tcp().map(|addr| addr.port())
    }
}

impl fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{}", addr),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Idempotent close signal shared by both virtual listeners and the handle
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// New, not yet triggered
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the signal; returns `false` if it was already triggered
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Whether the signal has fired
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires (returns at once if it already has)
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// The real listening socket
pub(crate) enum RealListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: PathBuf,
    },
}

impl RealListener {
    /// Open the socket described by `bind`
    pub(crate) async fn bind(bind: &BindAddress, backlog: u32) -> Result<Self> {
        match bind {
            BindAddress::Tcp { host, port } => Self::bind_tcp(bind, host, *port, backlog).await,
            BindAddress::Unix(path) => Self::bind_unix(path),
        }
    }

    async fn bind_tcp(bind: &BindAddress, host: &str, port: u16, backlog: u32) -> Result<Self> {
        let bind_error = |source: io::Error| ProxyError::Bind {
            addr: bind.to_string(),
            source,
        };

        let addrs: Vec<SocketAddr> = lookup_host((host, port)).await.map_err(bind_error)?.collect();
        let mut last_error =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no addresses");

        for addr in addrs {
            match Self::open_tcp(addr, backlog) {
                Ok(listener) => return Ok(Self::Tcp(listener)),
                Err(e) => {
                    debug!("Bind to {} failed: {}", addr, e);
                    last_error = e;
                }
            }
        }
        Err(bind_error(last_error))
    }

    fn open_tcp(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        #[cfg(unix)]
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(backlog)
    }

    #[cfg(unix)]
    fn bind_unix(path: &std::path::Path) -> Result<Self> {
        let listener = UnixListener::bind(path).map_err(|source| ProxyError::Bind {
            addr: path.display().to_string(),
            source,
        })?;
        Ok(Self::Unix {
            listener,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    fn bind_unix(path: &std::path::Path) -> Result<Self> {
        Err(ProxyError::Bind {
            addr: path.display().to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "Unix sockets are not supported on this platform",
            ),
        })
    }

    /// Address actually bound
    pub(crate) fn local_addr(&self) -> Result<BoundAddr> {
        match self {
            Self::Tcp(listener) => Ok(BoundAddr::Tcp(listener.local_addr()?)),
            #[cfg(unix)]
            Self::Unix { path, .. } => Ok(BoundAddr::Unix(path.clone())),
        }
    }

    /// Accept the next raw connection
    pub(crate) async fn accept(&self) -> io::Result<(BoxedStream, PeerAddr)> {
        match self {
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }
                Ok((Box::new(stream), PeerAddr::Tcp(addr)))
            }
            #[cfg(unix)]
            Self::Unix { listener, .. } => {
                let (stream, addr) = listener.accept().await?;
                let peer = PeerAddr::Unix(addr.as_pathname().map(|p| p.to_path_buf()));
                Ok((Box::new(stream), peer))
            }
        }
    }
}

impl Drop for RealListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Self::Unix { path, .. } = self {
                if let Err(e) = std::fs::remove_file(path.as_path()) {
                    warn!("Failed to remove socket file {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Which virtual listener a connection was routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// HTTP proxy connections
    Http,
    /// SOCKS4/SOCKS5 connections
    Socks,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Socks => write!(f, "socks"),
        }
    }
}

/// Listener-shaped view that only yields connections of one protocol
pub struct VirtualListener {
    kind: ListenerKind,
    rx: mpsc::Receiver<Connection>,
    shutdown: Shutdown,
    local_addr: BoundAddr,
}

impl VirtualListener {
    pub(crate) fn new(
        kind: ListenerKind,
        rx: mpsc::Receiver<Connection>,
        shutdown: Shutdown,
        local_addr: BoundAddr,
    ) -> Self {
        Self { kind, rx, shutdown, local_addr }
    }

    /// Protocol family served by this listener
    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    /// Address of the shared real socket
    pub fn local_addr(&self) -> &BoundAddr {
        &self.local_addr
    }

    /// Wait for the next connection
    ///
    /// Returns `None` once the listener (or its sibling) has been closed.
    pub async fn accept(&mut self) -> Option<Connection> {
        if self.shutdown.is_triggered() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            conn = self.rx.recv() => conn,
        }
    }

    /// Close this listener, its sibling and the real socket
    ///
    /// Safe to call any number of times from either listener.
    pub fn close(&self) {
        if self.shutdown.trigger() {
            info!("Closing {} listener on {}", self.kind, self.local_addr);
        }
    }
}

impl fmt::Debug for VirtualListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualListener")
            .field("kind", &self.kind)
            .field("local_addr", &self.local_addr)
            .field("closed", &self.shutdown.is_triggered())
            .finish()
    }
}
