//! Credential records and the connection target built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server address and credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Password for authentication.
    pub password: String,
}

impl ServerEndpoint {
    /// Borrows the endpoint as a connection target.
    #[must_use]
    pub fn target(&self) -> ConnectionTarget<'_> {
        ConnectionTarget {
            host: &self.host,
            port: self.port,
            user: &self.user,
            password: &self.password,
        }
    }
}

/// Incoming mail account (IMAP).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name for the account.
    pub name: String,
    /// Incoming server.
    #[serde(flatten)]
    pub server: ServerEndpoint,
}

impl Account {
    /// Loads an account from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Sending identity (SMTP).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name of the sender.
    pub name: String,
    /// Sender email address.
    pub email: String,
    /// Outgoing server.
    #[serde(flatten)]
    pub server: ServerEndpoint,
}

impl Identity {
    /// Loads an identity from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Host, port and credentials for a single connect call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTarget<'a> {
    /// Server hostname.
    pub host: &'a str,
    /// Server port.
    pub port: u16,
    /// Username for authentication.
    pub user: &'a str,
    /// Password for authentication.
    pub password: &'a str,
}

impl fmt::Debug for ConnectionTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Name and version the client announces to servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

impl AppIdentity {
    /// Creates an application identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}
