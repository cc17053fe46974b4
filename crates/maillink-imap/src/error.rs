//! Error types for the IMAP store.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while opening or talking to an IMAP store.
#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connection to the server could not be established.
    ///
    /// Covers refused, unreachable and timed out connects as well as a
    /// failure to bind the requested local address.
    #[error("Couldn't connect to {address}: {source}")]
    Connect {
        /// Remote address the connect was attempted against.
        address: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The server host name did not resolve.
    #[error("Couldn't resolve {host}: {source}")]
    Resolve {
        /// Host name that failed to resolve.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The server cannot provide the requested transport security.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the TCP connect itself failed.
    ///
    /// Errors raised after the socket was connected (TLS, greeting, login)
    /// are never connect failures.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_classification() {
        let refused = Error::Connect {
            address: "192.0.2.1:993".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_connect_failure());
        assert!(refused.to_string().contains("192.0.2.1:993"));

        assert!(!Error::Auth("bad password".into()).is_connect_failure());
        assert!(!Error::Io(std::io::ErrorKind::UnexpectedEof.into()).is_connect_failure());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_connect_failure());
    }
}
