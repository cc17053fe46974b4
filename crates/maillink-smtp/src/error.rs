//! Error types for SMTP operations.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connection to the server could not be established.
    #[error("Couldn't connect to {address}: {source}")]
    Connect {
        /// Remote address the connect was attempted against.
        address: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The server host name did not resolve.
    #[error("Couldn't resolve {host}: {source}")]
    Resolve {
        /// Host name that failed to resolve.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication rejected.
    #[error("Authentication failed ({code}): {message}")]
    Auth {
        /// Reply code (e.g., 535).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the TCP connect itself failed.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } | Self::Auth { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } | Self::Auth { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = Error::Connect {
            address: "[2001:db8::25]:587".parse().unwrap(),
            source: io::ErrorKind::ConnectionRefused.into(),
        };
        assert!(err.is_connect_failure());
        assert!(!err.is_permanent());

        let auth = Error::Auth {
            code: 535,
            message: "5.7.8 bad credentials".into(),
        };
        assert!(!auth.is_connect_failure());
        assert!(auth.is_permanent());

        assert!(Error::smtp_error(421, "busy").is_transient());
    }
}
