//! Protocol handler collaborators
//!
//! The multiplexer stops at classification and trust. Speaking HTTP proxy or
//! SOCKS on the handed-off stream is the job of these two traits.

use std::future::Future;
use std::sync::Arc;

use crate::auth::AuthDecision;
use crate::common::Result;
use super::connection::Connection;
use super::connector::{Connector, SocksErrorConnector};

/// Serves HTTP proxy connections
///
/// `auth` is never [`AuthDecision::AlwaysDeny`]; denied connections are
/// refused before they reach the handler. For
/// [`AuthDecision::Credentialed`] the handler must challenge the client and
/// check the answer with [`AuthDecision::permits`].
pub trait HttpHandler: Send + Sync + 'static {
    /// Take over one HTTP connection
    fn handle<C: Connector>(
        &self,
        conn: Connection,
        auth: AuthDecision,
        connector: Arc<C>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Serves SOCKS4 and SOCKS5 connections
///
/// Same contract as [`HttpHandler`], except the connector reports failures
/// as SOCKS reply codes.
pub trait SocksHandler: Send + Sync + 'static {
    /// Take over one SOCKS connection
    fn handle<C: Connector>(
        &self,
        conn: Connection,
        auth: AuthDecision,
        connector: SocksErrorConnector<C>,
    ) -> impl Future<Output = Result<()>> + Send;
}
