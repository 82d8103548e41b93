//! Protocol multiplexer
//!
//! Owns the accept loop of the real socket. Every accepted connection is
//! sniffed on its own task and routed to exactly one virtual listener.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::common::{BoxedStream, PeerAddr, Result};
use crate::config::{BindAddress, ProxyConfig};
use crate::protocol::Sniffer;
use super::connection::Connection;
use super::listener::{BoundAddr, ListenerKind, RealListener, Shutdown, VirtualListener};

/// Back-off after a failed accept (e.g. out of file descriptors)
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(50);

/// Tunables for the multiplexer
#[derive(Debug, Clone)]
pub struct MuxOptions {
    /// Pending-accept queue size per virtual listener
    pub accept_queue: usize,
    /// Listen backlog of the real TCP socket
    pub backlog: u32,
    /// Give up on clients that send nothing for this long
    pub detect_timeout: Option<Duration>,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self::from(&ProxyConfig::default())
    }
}

impl From<&ProxyConfig> for MuxOptions {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            accept_queue: config.accept_queue.max(1),
            backlog: config.backlog.max(1),
            detect_timeout: config.detect_timeout(),
        }
    }
}

/// The two virtual listeners sharing one real socket
#[derive(Debug)]
pub struct MuxListeners {
    /// Yields HTTP proxy connections
    pub http: VirtualListener,
    /// Yields SOCKS connections
    pub socks: VirtualListener,
    /// Bound address of the real socket
    pub local_addr: BoundAddr,
    /// Close signal shared with both listeners
    pub shutdown: Shutdown,
    /// Fires once the real socket has been dropped
    pub stopped: Shutdown,
}

/// Bind the real socket and start routing connections
pub async fn bind(bind: &BindAddress, options: &MuxOptions) -> Result<MuxListeners> {
    let listener = RealListener::bind(bind, options.backlog).await?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let (http_tx, http_rx) = mpsc::channel(options.accept_queue);
    let (socks_tx, socks_rx) = mpsc::channel(options.accept_queue);
    let shutdown = Shutdown::new();
    let stopped = Shutdown::new();

    let router = Router {
        sniffer: Sniffer::default().with_timeout(options.detect_timeout),
        http: http_tx,
        socks: socks_tx,
    };
    tokio::spawn(run_accept_loop(listener, Arc::new(router), shutdown.clone(), stopped.clone()));

    Ok(MuxListeners {
        http: VirtualListener::new(
            ListenerKind::Http,
            http_rx,
            shutdown.clone(),
            local_addr.clone(),
        ),
        socks: VirtualListener::new(
            ListenerKind::Socks,
            socks_rx,
            shutdown.clone(),
            local_addr.clone(),
        ),
        local_addr,
        shutdown,
        stopped,
    })
}

struct Router {
    sniffer: Sniffer,
    http: mpsc::Sender<Connection>,
    socks: mpsc::Sender<Connection>,
}

impl Router {
    async fn route(&self, stream: BoxedStream, peer: PeerAddr) {
        let (protocol, stream) = match self.sniffer.classify(stream).await {
            Ok(classified) => classified,
            Err(e) => {
                debug!("Dropping connection from {}: {}", peer, e);
                return;
            }
        };
        debug!("Routing {} connection from {}", protocol, peer);

        let queue = if protocol.is_socks() { &self.socks } else { &self.http };
        if queue.send(Connection::new(protocol, peer, stream)).await.is_err() {
            trace!("Listener closed, dropping {} connection", protocol);
        }
    }
}

async fn run_accept_loop(
    listener: RealListener,
    router: Arc<Router>,
    shutdown: Shutdown,
    stopped: Shutdown,
) {
    let mut tasks = JoinSet::new();

    loop {
        // Reap finished classification tasks
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("Classification task error: {}", e);
            }
        }

        tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let router = Arc::clone(&router);
                    tasks.spawn(async move { router.route(stream, peer).await });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                }
            }
        }
    }

    // Unclassified connections belong to no handler yet; dropping the set aborts them
    drop(tasks);
    drop(listener);
    info!("Listener closed");
    stopped.trigger();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn bind_local() -> MuxListeners {
        let addr = BindAddress::Tcp { host: "127.0.0.1".to_string(), port: 0 };
        bind(&addr, &MuxOptions::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_routes_by_first_byte() {
        let mut mux = bind_local().await;
        let addr = mux.local_addr.as_tcp().unwrap();

        let mut socks_client = TcpStream::connect(addr).await.unwrap();
        socks_client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut conn = mux.socks.accept().await.unwrap();
        let mut greeting = [0u8; 3];
        conn.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, [0x05, 0x01, 0x00]);

        let mut http_client = TcpStream::connect(addr).await.unwrap();
        http_client.write_all(b"GET http://a/ HTTP/1.1\r\n\r\n").await.unwrap();
        let conn = mux.http.accept().await.unwrap();
        assert_eq!(conn.protocol(), crate::protocol::Protocol::Http);
        assert!(conn.peer().is_local());
    }

    #[tokio::test]
    async fn test_silent_client_does_not_block_others() {
        let mut mux = bind_local().await;
        let addr = mux.local_addr.as_tcp().unwrap();

        let _silent = TcpStream::connect(addr).await.unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0x04]).await.unwrap();

        let conn = mux.socks.accept().await.unwrap();
        assert!(conn.protocol().is_socks());
    }

    #[tokio::test]
    async fn test_close_stops_real_socket() {
        let mux = bind_local().await;
        let addr = mux.local_addr.as_tcp().unwrap();

        mux.http.close();
        mux.socks.close();
        mux.stopped.wait().await;

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
