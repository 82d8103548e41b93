//! Listening address parsing
//!
//! Three mutually exclusive forms are accepted:
//!
//! - `[user:pass@]host:port`
//! - `[user:pass@]host:0` (ephemeral port)
//! - `[user:pass@]/path/to/socket` (also `./` and `../` relative paths)
//!
//! User and password are percent-decoded.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::auth::Credentials;
use crate::common::{ProxyError, Result};

/// Where the real listening socket is bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAddress {
    /// TCP host and port; port 0 requests an ephemeral port
    Tcp {
        /// Host name or IP literal, without brackets
        host: String,
        /// Port number
        port: u16,
    },
    /// Unix domain socket path
    Unix(PathBuf),
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Self::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved bind specification
///
/// Built once from the listening address string and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenTarget {
    bind: BindAddress,
    credentials: Option<Credentials>,
}

impl ListenTarget {
    /// Create a target from its parts
    pub fn new(bind: BindAddress, credentials: Option<Credentials>) -> Self {
        Self { bind, credentials }
    }

    /// Bind address
    pub fn bind(&self) -> &BindAddress {
        &self.bind
    }

    /// Static credentials, if the address carried any
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Whether an ephemeral TCP port was requested
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.bind, BindAddress::Tcp { port: 0, .. })
    }

    /// Parse a listening address string
    pub fn parse(listen: &str) -> Result<Self> {
        let listen = listen.trim();
        if listen.is_empty() {
            return Err(ProxyError::InvalidAddress("empty listening address".to_string()));
        }

        if let Some(target) = parse_path_form(listen)? {
            return Ok(target);
        }
        parse_host_form(listen)
    }
}

impl FromStr for ListenTarget {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some(creds) => write!(f, "{}@{}", creds, self.bind),
            None => write!(f, "{}", self.bind),
        }
    }
}

fn looks_like_path(s: &str) -> bool {
    s.starts_with('/') || s.starts_with("./") || s.starts_with("../")
}

fn parse_path_form(listen: &str) -> Result<Option<ListenTarget>> {
    if looks_like_path(listen) {
        return Ok(Some(ListenTarget::new(BindAddress::Unix(PathBuf::from(listen)), None)));
    }

    let Some((userinfo, path)) = listen.split_once('@') else {
        return Ok(None);
    };
    if !looks_like_path(path) {
        return Ok(None);
    }

    let (user, pass) = userinfo.split_once(':').unwrap_or((userinfo, ""));
    let credentials = credentials_from(&decode(user)?, &decode(pass)?)?;
    Ok(Some(ListenTarget::new(BindAddress::Unix(PathBuf::from(path)), credentials)))
}

fn parse_host_form(listen: &str) -> Result<ListenTarget> {
    let invalid = |reason: &str| ProxyError::InvalidAddress(format!("{}: {}", reason, listen));

    // Non-special scheme: no default port, so a missing port stays missing
    let url = Url::parse(&format!("tcp://{}", listen)).map_err(|e| invalid(&e.to_string()))?;

    if !url.path().is_empty() || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("unexpected path in host:port address"));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        _ => return Err(invalid("missing host")),
    };
    let port = url.port().ok_or_else(|| invalid("missing port"))?;

    let user = decode(url.username())?;
    let pass = decode(url.password().unwrap_or(""))?;
    let credentials = credentials_from(&user, &pass)?;

    Ok(ListenTarget::new(BindAddress::Tcp { host, port }, credentials))
}

fn credentials_from(user: &str, pass: &str) -> Result<Option<Credentials>> {
    match (user.is_empty(), pass.is_empty()) {
        (false, _) => Ok(Some(Credentials::new(user, pass))),
        (true, true) => Ok(None),
        (true, false) => Err(ProxyError::InvalidAddress(
            "password given without a username".to_string(),
        )),
    }
}

fn decode(part: &str) -> Result<String> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ProxyError::InvalidAddress(format!("invalid percent-encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(host: &str, port: u16) -> BindAddress {
        BindAddress::Tcp { host: host.to_string(), port }
    }

    #[test]
    fn test_host_port() {
        let t = ListenTarget::parse("127.0.0.1:8080").unwrap();
        assert_eq!(t.bind(), &tcp("127.0.0.1", 8080));
        assert!(t.credentials().is_none());
        assert!(!t.is_ephemeral());
    }

    #[test]
    fn test_default_http_port_is_kept() {
        let t = ListenTarget::parse("0.0.0.0:80").unwrap();
        assert_eq!(t.bind(), &tcp("0.0.0.0", 80));
    }

    #[test]
    fn test_ephemeral_port() {
        let t = ListenTarget::parse("127.0.0.1:0").unwrap();
        assert!(t.is_ephemeral());
        assert_eq!(t.bind(), &tcp("127.0.0.1", 0));
    }

    #[test]
    fn test_ipv6_and_hostname() {
        let t = ListenTarget::parse("[::1]:1080").unwrap();
        assert_eq!(t.bind(), &tcp("::1", 1080));
        assert_eq!(t.bind().to_string(), "[::1]:1080");

        let t = ListenTarget::parse("localhost:3128").unwrap();
        assert_eq!(t.bind(), &tcp("localhost", 3128));
    }

    #[test]
    fn test_credentials_are_decoded() {
        let t = ListenTarget::parse("alice:secret@0.0.0.0:1080").unwrap();
        assert_eq!(t.credentials(), Some(&Credentials::new("alice", "secret")));

        let t = ListenTarget::parse("us%20er:p%40ss@127.0.0.1:1080").unwrap();
        assert_eq!(t.credentials(), Some(&Credentials::new("us er", "p@ss")));
    }

    #[test]
    fn test_username_without_password() {
        let t = ListenTarget::parse("alice@127.0.0.1:1080").unwrap();
        assert_eq!(t.credentials(), Some(&Credentials::new("alice", "")));

        let t = ListenTarget::parse("alice:@127.0.0.1:1080").unwrap();
        assert_eq!(t.credentials(), Some(&Credentials::new("alice", "")));
    }

    #[test]
    fn test_unix_paths() {
        let t = ListenTarget::parse("/tmp/proxy.sock").unwrap();
        assert_eq!(t.bind(), &BindAddress::Unix(PathBuf::from("/tmp/proxy.sock")));
        assert!(t.credentials().is_none());

        let t = ListenTarget::parse("./proxy.sock").unwrap();
        assert_eq!(t.bind(), &BindAddress::Unix(PathBuf::from("./proxy.sock")));

        let t = ListenTarget::parse("al%69ce:pw@/run/a@b.sock").unwrap();
        assert_eq!(t.bind(), &BindAddress::Unix(PathBuf::from("/run/a@b.sock")));
        assert_eq!(t.credentials(), Some(&Credentials::new("alice", "pw")));
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in [
            "",
            "127.0.0.1",
            "localhost",
            ":8080",
            "127.0.0.1:99999",
            "127.0.0.1:80/path",
            "127.0.0.1:abc",
            ":secret@127.0.0.1:80",
        ] {
            match ListenTarget::parse(bad) {
                Err(ProxyError::InvalidAddress(_)) => {}
                other => panic!("expected InvalidAddress for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_display_redacts_password() {
        let t = ListenTarget::parse("alice:secret@0.0.0.0:1080").unwrap();
        assert_eq!(t.to_string(), "alice:***@0.0.0.0:1080");
    }
}
