//! IMAP connection management.
//!
//! - Configuration (host, port, security mode, socket binding)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for the IMAP protocol

mod config;
mod framed;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect, create_tls_connector};
