//! Protocol detection module
//!
//! Decides from the first byte of a connection whether it speaks SOCKS or
//! HTTP, without losing that byte for the handler that takes over.

mod detector;

pub use detector::{
    DetectionResult, Protocol, ProtocolDetector, Sniffer, SocksDetector, SocksVersion,
    SOCKS4_VERSION, SOCKS5_VERSION,
};
