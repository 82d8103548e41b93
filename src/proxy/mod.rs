//! Proxy service module
//!
//! One real socket, sniffed and split into an HTTP and a SOCKS virtual
//! listener, each served by its own handler behind the trust gate.

mod connection;
mod connector;
mod handler;
mod listener;
pub mod mux;
mod reject;
pub mod server;

pub use connection::Connection;
pub use connector::{Connector, SocksErrorConnector, SocksReply, TcpConnector};
pub use handler::{HttpHandler, SocksHandler};
pub use listener::{BoundAddr, ListenerKind, Shutdown, VirtualListener};
pub use mux::{MuxListeners, MuxOptions};
pub use reject::{refusal, reject};
pub use server::{ProxyServer, ServerHandle};
