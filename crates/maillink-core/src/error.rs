//! Error types for connection establishment.

use thiserror::Error;

/// Errors that can occur while establishing or using a mail connection.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] maillink_imap::Error),

    /// SMTP operation failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] maillink_smtp::Error),

    /// No provider exists for the configured protocol.
    #[error("No provider for protocol {0}")]
    UnsupportedProvider(String),

    /// A host or local address could not be determined.
    #[error("Couldn't resolve {host}: {source}")]
    Resolution {
        /// Host whose address lookup failed.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No connection is active.
    #[error("Not connected")]
    NotConnected,

    /// The active connection is of the other service kind.
    #[error("Protocol {protocol} does not provide a {requested}")]
    WrongServiceKind {
        /// Configured protocol name.
        protocol: String,
        /// Service kind the caller asked for.
        requested: &'static str,
    },

    /// The establisher has been closed.
    #[error("Connection establisher is closed")]
    Closed,
}

impl Error {
    /// Returns true if a socket could not be connected.
    ///
    /// Only these failures start the local interface fallback.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        match self {
            Self::Imap(e) => e.is_connect_failure(),
            Self::Smtp(e) => e.is_connect_failure(),
            _ => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
