//! Default configuration values
//!
//! Single source of truth for defaults, shared by serde and `Default`.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "PROXY_MUX_";

/// Default listening address: loopback only
pub const LISTEN_STR: &str = "127.0.0.1:8080";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listening address
pub fn listen() -> String {
    LISTEN_STR.to_string()
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Unprotected operation is off unless asked for
pub fn allow_unprotected() -> bool {
    false
}

/// Protocol detection timeout in milliseconds (0 waits indefinitely)
pub fn detect_timeout_ms() -> u64 {
    0
}

/// Outbound connect timeout in seconds
pub fn connect_timeout() -> u64 {
    30
}

/// Connections each virtual listener may hold before the sniffer waits
pub fn accept_queue() -> usize {
    128
}

/// Listen backlog for the real TCP socket
pub fn backlog() -> u32 {
    1024
}
