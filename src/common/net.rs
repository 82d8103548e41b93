//! Network utility functions
//!
//! Remote endpoint identity and address locality checks used by the trust gate.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use ipnet::Ipv6Net;

/// Remote endpoint of an accepted connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    /// TCP peer
    Tcp(SocketAddr),
    /// Unix domain socket peer (usually unnamed)
    Unix(Option<PathBuf>),
    /// Peer address could not be determined
    Unknown,
}

impl PeerAddr {
    /// Whether the peer is on this machine or a private network
    ///
    /// Unix socket peers are always local. Unknown peers never are.
    pub fn is_local(&self) -> bool {
        match self {
            Self::Tcp(addr) => is_local_ip(addr.ip()),
            Self::Unix(_) => true,
            Self::Unknown => false,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
            Self::Unix(Some(path)) => write!(f, "unix://{}", path.display()),
            Self::Unix(None) => write!(f, "unix://"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::Tcp(addr)
    }
}

/// Unique local addresses, fc00::/7
const UNIQUE_LOCAL_V6: Ipv6Net = Ipv6Net::new_assert(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7);

/// Link-local unicast, fe80::/10
const LINK_LOCAL_V6: Ipv6Net = Ipv6Net::new_assert(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10);

/// Check whether an IP address is loopback, private-use or link-local
pub fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_local_ipv4(ip),
        IpAddr::V6(ip) => {
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_local_ipv4(mapped);
            }
            is_local_ipv6(ip)
        }
    }
}

fn is_local_ipv4(ip: Ipv4Addr) -> bool {
    // 127/8, 10/8, 172.16/12, 192.168/16, 169.254/16
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

fn is_local_ipv6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || UNIQUE_LOCAL_V6.contains(&ip) || LINK_LOCAL_V6.contains(&ip)
}

/// Check whether a textual host is a local IP address
///
/// Accepts bracketed IPv6 literals (`[::1]`). Host names are never
/// considered local since they are not resolved here.
pub fn is_local_host(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(is_local_ip)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_loopback_is_local() {
        assert!(is_local_ip(ip("127.0.0.1")));
        assert!(is_local_ip(ip("127.10.0.3")));
        assert!(is_local_ip(ip("::1")));
    }

    #[test]
    fn test_private_ranges_are_local() {
        assert!(is_local_ip(ip("10.0.0.1")));
        assert!(is_local_ip(ip("172.16.0.1")));
        assert!(is_local_ip(ip("172.31.255.254")));
        assert!(is_local_ip(ip("192.168.1.1")));
        assert!(is_local_ip(ip("169.254.1.1")));
        assert!(is_local_ip(ip("fc00::1")));
        assert!(is_local_ip(ip("fd12:3456::1")));
        assert!(is_local_ip(ip("fe80::1")));
        assert!(is_local_ip(ip("febf:ffff::1")));
        assert!(is_local_ip(ip("fdff:ffff:ffff:ffff::1")));
    }

    #[test]
    fn test_public_is_not_local() {
        assert!(!is_local_ip(ip("8.8.8.8")));
        assert!(!is_local_ip(ip("172.32.0.1")));
        assert!(!is_local_ip(ip("100.64.0.1")));
        assert!(!is_local_ip(ip("2001:4860:4860::8888")));
        assert!(!is_local_ip(ip("fec0::1")));
        assert!(!is_local_ip(ip("fbff:ffff::1")));
        assert!(!is_local_ip(ip("0.0.0.0")));
    }

    #[test]
    fn test_ipv6_local_ranges() {
        assert_eq!(UNIQUE_LOCAL_V6.to_string(), "fc00::/7");
        assert_eq!(LINK_LOCAL_V6.to_string(), "fe80::/10");
    }

    #[test]
    fn test_ipv4_mapped() {
        assert!(is_local_ip(ip("::ffff:127.0.0.1")));
        assert!(is_local_ip(ip("::ffff:192.168.0.10")));
        assert!(!is_local_ip(ip("::ffff:8.8.8.8")));
    }

    #[test]
    fn test_local_host_strips_brackets() {
        assert!(is_local_host("[::1]"));
        assert!(is_local_host("::1"));
        assert!(is_local_host("127.0.0.1"));
        assert!(!is_local_host("[2001:4860::1]"));
        assert!(!is_local_host("localhost"));
        assert!(!is_local_host(""));
    }

    #[test]
    fn test_peer_locality() {
        assert!(PeerAddr::from("127.0.0.1:5000".parse::<SocketAddr>().unwrap()).is_local());
        assert!(!PeerAddr::from("8.8.8.8:53".parse::<SocketAddr>().unwrap()).is_local());
        assert!(PeerAddr::Unix(None).is_local());
        assert!(!PeerAddr::Unknown.is_local());
    }

    #[test]
    fn test_peer_display() {
        let peer = PeerAddr::from("[::1]:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(peer.to_string(), "tcp://[::1]:8080");
        assert_eq!(PeerAddr::Unknown.to_string(), "unknown");
    }
}
