//! Common module
//!
//! Shared types, errors and utility functions used throughout the crate.

pub mod error;
pub mod log;
pub mod net;
pub mod stream;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use log::init_logger;
pub use net::{is_local_host, is_local_ip, PeerAddr};
pub use stream::{AsyncReadWrite, BoxedStream, PrefixedStream};
