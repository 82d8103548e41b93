//! Proxy server module
//!
//! Ties the pieces together: parse the listening address, bind the shared
//! socket, and serve each virtual listener with its protocol handler behind
//! the trust gate.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::task::JoinSet;

use crate::auth::{AuthDecision, AuthPolicy, TrustGate};
use crate::common::Result;
use crate::config::{ListenTarget, ProxyConfig};
use super::connection::Connection;
use super::connector::{Connector, SocksErrorConnector};
use super::handler::{HttpHandler, SocksHandler};
use super::listener::{BoundAddr, Shutdown, VirtualListener};
use super::mux::{self, MuxOptions};
use super::reject::reject;

/// HTTP and SOCKS proxy on a single listening address
///
/// Holds the protocol handlers and the outbound connector they share. One
/// server can [`listen`](Self::listen) on any number of addresses.
pub struct ProxyServer<C, H, S> {
    connector: Arc<C>,
    http: Arc<H>,
    socks: Arc<S>,
    config: ProxyConfig,
}

impl<C, H, S> ProxyServer<C, H, S>
where
    C: Connector,
    H: HttpHandler,
    S: SocksHandler,
{
    /// Create a server with default settings
    pub fn new(connector: C, http: H, socks: S) -> Self {
        Self {
            connector: Arc::new(connector),
            http: Arc::new(http),
            socks: Arc::new(socks),
            config: ProxyConfig::default(),
        }
    }

    /// Replace the server settings
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Start listening on `listen`
    ///
    /// `listen` is `[user:pass@]host:port` or `[user:pass@]/path/to/socket`.
    /// Only an unparsable address ([`ProxyError::InvalidAddress`]) or a
    /// socket that cannot be opened ([`ProxyError::Bind`]) fail here; all
    /// later problems stay with the connection they happened on.
    ///
    /// [`ProxyError::InvalidAddress`]: crate::ProxyError::InvalidAddress
    /// [`ProxyError::Bind`]: crate::ProxyError::Bind
    pub async fn listen(&self, listen: &str, allow_unprotected: bool) -> Result<ServerHandle> {
        let target = ListenTarget::parse(listen)?;
        let gate = Arc::new(TrustGate::new(&target, allow_unprotected));

        let listeners = mux::bind(target.bind(), &MuxOptions::from(&self.config)).await?;
        info!("Proxy listening on {} ({})", listeners.local_addr, gate.policy());

        let socks_connector = SocksErrorConnector::new(Arc::clone(&self.connector));
        let http_connector = Arc::clone(&self.connector);

        let http = Arc::clone(&self.http);
        tokio::spawn(serve(listeners.http, Arc::clone(&gate), move |conn, auth| {
            let http = Arc::clone(&http);
            let connector = Arc::clone(&http_connector);
            async move { http.handle(conn, auth, connector).await }
        }));

        let socks = Arc::clone(&self.socks);
        tokio::spawn(serve(listeners.socks, Arc::clone(&gate), move |conn, auth| {
            let socks = Arc::clone(&socks);
            let connector = socks_connector.clone();
            async move { socks.handle(conn, auth, connector).await }
        }));

        Ok(ServerHandle {
            local_addr: listeners.local_addr,
            policy: gate.policy().clone(),
            shutdown: listeners.shutdown,
            stopped: listeners.stopped,
        })
    }

    /// Listen on the address and trust mode from the server settings
    pub async fn listen_configured(&self) -> Result<ServerHandle> {
        self.listen(&self.config.listen, self.config.allow_unprotected).await
    }
}

/// Accept from one virtual listener until it is closed
async fn serve<F, Fut>(mut listener: VirtualListener, gate: Arc<TrustGate>, handle: F)
where
    F: Fn(Connection, AuthDecision) -> Fut,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let kind = listener.kind();
    let mut tasks = JoinSet::new();

    while let Some(conn) = listener.accept().await {
        // Check for completed tasks and log any errors
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("{} handler task error: {}", kind, e);
            }
        }

        let peer = conn.peer().clone();
        let protocol = conn.protocol();

        match gate.decide(&peer) {
            AuthDecision::AlwaysDeny => {
                info!("Denied {} connection from {}", protocol, peer);
                tasks.spawn(async move {
                    if let Err(e) = reject(conn).await {
                        debug!("Refusal to {} failed: {}", peer, e);
                    }
                });
            }
            auth => {
                debug!(
                    "Handing {} connection from {} to {} handler ({})",
                    protocol, peer, kind, auth
                );
                let task = handle(conn, auth);
                tasks.spawn(async move {
                    if let Err(e) = task.await {
                        warn!("{} handler failed for {}: {}", protocol, peer, e);
                    }
                });
            }
        }
    }

    // Handed-off connections belong to their handlers now
    tasks.detach_all();
    debug!("{} listener stopped serving", kind);
}

/// Handle to a listening proxy
///
/// Dropping the handle does not stop the proxy; call [`close`](Self::close).
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: BoundAddr,
    policy: AuthPolicy,
    shutdown: Shutdown,
    stopped: Shutdown,
}

impl ServerHandle {
    /// Bound address, with an ephemeral port resolved
    pub fn local_addr(&self) -> &BoundAddr {
        &self.local_addr
    }

    /// Trust policy applied to this listener
    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stop accepting connections and close the listening socket
    ///
    /// Connections already handed to a handler keep running. Calling this
    /// more than once is harmless.
    pub fn close(&self) {
        if self.shutdown.trigger() {
            info!("Closing proxy on {}", self.local_addr);
        }
    }

    /// Wait until the listening socket has actually been released
    pub async fn stopped(&self) {
        self.stopped.wait().await
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("policy", &self.policy.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ProxyError;
    use crate::proxy::TcpConnector;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::common::{BoxedStream, PeerAddr, PrefixedStream};
    use crate::protocol::{Protocol, SocksVersion};
    use crate::proxy::{refusal, ListenerKind};

    struct Idle;

    impl HttpHandler for Idle {
        fn handle<C: Connector>(
            &self,
            _conn: Connection,
            _auth: AuthDecision,
            _connector: Arc<C>,
        ) -> impl Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }
    }

    impl SocksHandler for Idle {
        fn handle<C: Connector>(
            &self,
            _conn: Connection,
            _auth: AuthDecision,
            _connector: SocksErrorConnector<C>,
        ) -> impl Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }
    }

    fn server() -> ProxyServer<TcpConnector, Idle, Idle> {
        ProxyServer::new(TcpConnector::default(), Idle, Idle)
    }

    #[tokio::test]
    async fn test_listen_ephemeral_port() {
        let handle = server().listen("127.0.0.1:0", false).await.unwrap();
        assert_ne!(handle.local_addr().port(), Some(0));
        assert_eq!(handle.policy(), &AuthPolicy::LocalOnly);
        handle.close();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn test_listen_invalid_address() {
        let result = server().listen("not an address", false).await;
        assert!(matches!(result, Err(ProxyError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_close_twice() {
        let handle = server().listen("127.0.0.1:0", true).await.unwrap();
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        handle.stopped().await;
    }

    #[tokio::test]
    async fn test_listen_configured() {
        let config = ProxyConfig {
            listen: "127.0.0.1:0".to_string(),
            allow_unprotected: true,
            ..ProxyConfig::default()
        };
        let handle = server().with_config(config).listen_configured().await.unwrap();
        assert_eq!(handle.policy(), &AuthPolicy::Open);
        handle.close();
    }

    async fn serve_one(protocol: Protocol, first: u8, peer: &str) -> (Vec<u8>, usize) {
        let (tx, rx) = mpsc::channel(1);
        let shutdown = Shutdown::new();
        let addr = BoundAddr::Tcp("127.0.0.1:1080".parse().unwrap());
        let listener = VirtualListener::new(ListenerKind::Socks, rx, shutdown.clone(), addr);
        let gate = Arc::new(TrustGate::from_policy(AuthPolicy::LocalOnly));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = tokio::spawn(serve(listener, gate, move |_conn, _auth| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), ProxyError>(()) }
        }));

        let (server, mut client) = duplex(1024);
        let boxed: BoxedStream = Box::new(server);
        let peer = PeerAddr::Tcp(peer.parse().unwrap());
        let conn = Connection::new(protocol, peer, PrefixedStream::new(vec![first], boxed));
        tx.send(conn).await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = Vec::new();
        timeout(Duration::from_secs(5), client.read_to_end(&mut reply))
            .await
            .unwrap()
            .unwrap();

        shutdown.trigger();
        task.await.unwrap();
        (reply, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_denied_peer_gets_refusal_not_handler() {
        let cases = [
            (Protocol::Socks(SocksVersion::V5), 0x05),
            (Protocol::Socks(SocksVersion::V4), 0x04),
            (Protocol::Http, b'G'),
        ];

        for (protocol, first) in cases {
            let (reply, calls) = serve_one(protocol, first, "8.8.8.8:1").await;
            assert_eq!(reply, refusal(protocol), "{} refusal", protocol);
            assert_eq!(calls, 0, "{} handler must not run", protocol);
        }
    }

    #[tokio::test]
    async fn test_local_peer_reaches_handler() {
        let (reply, calls) = serve_one(Protocol::Socks(SocksVersion::V5), 0x05, "10.1.2.3:1").await;
        assert!(reply.is_empty());
        assert_eq!(calls, 1);
    }
}
