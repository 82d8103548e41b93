//! Trust gate
//!
//! Decides, per connection, whether a client may proceed without
//! credentials. The same policy function backs both the HTTP and the SOCKS
//! path so the two cannot drift apart.

use std::fmt;

use log::trace;

use super::credentials::Credentials;
use crate::common::PeerAddr;
use crate::config::ListenTarget;

/// Outcome of the trust policy for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// No credentials needed
    Open,
    /// Client must present exactly these credentials
    Credentialed(Credentials),
    /// Refuse before any credential exchange
    AlwaysDeny,
}

impl AuthDecision {
    /// Check what a client presented against this decision
    ///
    /// `presented` is `None` when the client offered no credentials.
    pub fn permits(&self, presented: Option<(&str, &str)>) -> bool {
        match (self, presented) {
            (Self::Open, _) => true,
            (Self::Credentialed(expected), Some((user, pass))) => expected.verify(user, pass),
            (Self::Credentialed(_), None) => false,
            (Self::AlwaysDeny, _) => false,
        }
    }
}

impl fmt::Display for AuthDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Credentialed(creds) => write!(f, "credentialed ({})", creds.username()),
            Self::AlwaysDeny => write!(f, "deny"),
        }
    }
}

/// Listener-wide policy, fixed when the server starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Static credentials from the listening address
    Credentialed(Credentials),
    /// Unprotected operation explicitly allowed
    Open,
    /// Default-safe posture: only local peers pass
    LocalOnly,
}

impl fmt::Display for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentialed(creds) => write!(f, "credentials required for {}", creds.username()),
            Self::Open => write!(f, "open to all clients"),
            Self::LocalOnly => write!(f, "local clients only"),
        }
    }
}

/// Per-connection trust evaluation
///
/// Holds only the immutable listener policy; `decide` is a pure function of
/// that policy and the peer address.
#[derive(Debug, Clone)]
pub struct TrustGate {
    policy: AuthPolicy,
}

impl TrustGate {
    /// Build the gate for a resolved listening target
    pub fn new(target: &ListenTarget, allow_unprotected: bool) -> Self {
        let policy = match target.credentials() {
            Some(creds) => AuthPolicy::Credentialed(creds.clone()),
            None if allow_unprotected => AuthPolicy::Open,
            None => AuthPolicy::LocalOnly,
        };
        Self { policy }
    }

    /// Build a gate from an explicit policy
    pub fn from_policy(policy: AuthPolicy) -> Self {
        Self { policy }
    }

    /// The listener-wide policy this gate evaluates
    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Decide for a connection from `peer`
    pub fn decide(&self, peer: &PeerAddr) -> AuthDecision {
        let decision = match &self.policy {
            AuthPolicy::Credentialed(creds) => AuthDecision::Credentialed(creds.clone()),
            AuthPolicy::Open => AuthDecision::Open,
            AuthPolicy::LocalOnly if peer.is_local() => AuthDecision::Open,
            AuthPolicy::LocalOnly => AuthDecision::AlwaysDeny,
        };
        trace!("Trust decision: {}", decision);
        decision
    }
}

/// Evaluate the trust policy for one connection
///
/// Convenience wrapper around [`TrustGate`].
pub fn decide(target: &ListenTarget, allow_unprotected: bool, peer: &PeerAddr) -> AuthDecision {
    TrustGate::new(target, allow_unprotected).decide(peer)
}
