//! Proxy Mux: HTTP and SOCKS proxying on a single listening socket
//!
//! Every accepted connection is classified by its first byte: `0x04` and
//! `0x05` go to the SOCKS handler, anything else to the HTTP handler. The
//! byte used for classification is replayed, so handlers see exactly what
//! the client sent.
//!
//! Access is decided per connection by one trust policy shared by both
//! protocols:
//!
//! - credentials in the listening address (`user:pass@host:port`) are
//!   required from every client;
//! - otherwise, with unprotected operation allowed, everyone is let in;
//! - otherwise only loopback and private-network peers are let in.
//!
//! # Example
//!
//! ```no_run
//! use std::future::Future;
//! use std::sync::Arc;
//! use proxy_mux::{AuthDecision, Result};
//! use proxy_mux::proxy::{
//!     Connection, Connector, HttpHandler, ProxyServer, SocksErrorConnector, SocksHandler,
//!     TcpConnector,
//! };
//!
//! struct Http;
//!
//! impl HttpHandler for Http {
//!     fn handle<C: Connector>(
//!         &self,
//!         _conn: Connection,
//!         _auth: AuthDecision,
//!         _connector: Arc<C>,
//!     ) -> impl Future<Output = Result<()>> + Send {
//!         async { Ok(()) }
//!     }
//! }
//!
//! struct Socks;
//!
//! impl SocksHandler for Socks {
//!     fn handle<C: Connector>(
//!         &self,
//!         _conn: Connection,
//!         _auth: AuthDecision,
//!         _connector: SocksErrorConnector<C>,
//!     ) -> impl Future<Output = Result<()>> + Send {
//!         async { Ok(()) }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = ProxyServer::new(TcpConnector::default(), Http, Socks);
//!     let handle = server.listen("127.0.0.1:8080", false).await?;
//!     println!("listening on {}", handle.local_addr());
//!
//!     handle.stopped().await;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod auth;
pub mod common;
pub mod config;
pub mod protocol;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use auth::{AuthDecision, AuthPolicy, Credentials, TrustGate};
pub use common::{init_logger, PeerAddr, ProxyError, Result};
pub use config::{ListenTarget, ProxyConfig};
pub use protocol::Protocol;
pub use proxy::{BoundAddr, ProxyServer, ServerHandle};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
