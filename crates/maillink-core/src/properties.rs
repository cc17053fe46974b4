//! Session properties.
//!
//! A typed replacement for a string keyed property bag: settings shared by
//! every protocol live in [`TransportSettings`], the rest in a
//! [`FamilySettings`] variant chosen by the protocol's service family.

use std::net::IpAddr;
use std::time::Duration;

use crate::protocol::{Protocol, ServiceFamily};

/// Default socket connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default read/write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Socket level settings common to stores and transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Local address to bind before connecting.
    pub local_address: Option<IpAddr>,
    /// Remote address to connect to instead of resolving the host.
    pub remote_address: Option<IpAddr>,
    /// Socket connect timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Stay in plaintext if the server does not offer STARTTLS.
    pub allow_plaintext: bool,
    /// Trace protocol lines.
    pub debug: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            local_address: None,
            remote_address: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            allow_plaintext: false,
            debug: false,
        }
    }
}

/// Settings that only apply to one service family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilySettings {
    /// Store (IMAP) settings.
    Store {
        /// Fetch message bodies in parts.
        partial_fetch: bool,
        /// Use a separate socket for store level commands.
        separate_store_connection: bool,
    },
    /// Transport (SMTP) settings.
    Transport {
        /// Name announced in EHLO. `None` uses the transport default.
        local_hostname: Option<String>,
    },
    /// Protocol without a provider.
    Unsupported,
}

impl FamilySettings {
    /// Returns the defaults for a service family.
    #[must_use]
    pub const fn for_family(family: Option<ServiceFamily>) -> Self {
        match family {
            Some(ServiceFamily::Store) => Self::Store {
                partial_fetch: true,
                separate_store_connection: false,
            },
            Some(ServiceFamily::Transport) => Self::Transport {
                local_hostname: None,
            },
            None => Self::Unsupported,
        }
    }
}

/// All properties a session is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProperties {
    /// Shared socket settings.
    pub transport: TransportSettings,
    /// Per-family settings.
    pub family: FamilySettings,
}

impl SessionProperties {
    /// Creates the default properties for a protocol.
    #[must_use]
    pub fn for_protocol(protocol: &Protocol, insecure: bool, debug: bool) -> Self {
        Self {
            transport: TransportSettings {
                allow_plaintext: insecure,
                debug,
                ..TransportSettings::default()
            },
            family: FamilySettings::for_family(protocol.family()),
        }
    }

    /// Returns the partial fetch flag, if this is a store.
    #[must_use]
    pub const fn partial_fetch(&self) -> Option<bool> {
        match self.family {
            FamilySettings::Store { partial_fetch, .. } => Some(partial_fetch),
            _ => None,
        }
    }

    /// Returns the separate store connection flag, if this is a store.
    #[must_use]
    pub const fn separate_store_connection(&self) -> Option<bool> {
        match self.family {
            FamilySettings::Store {
                separate_store_connection,
                ..
            } => Some(separate_store_connection),
            _ => None,
        }
    }

    /// Returns the announced local hostname, if this is a transport and one is set.
    #[must_use]
    pub fn local_hostname(&self) -> Option<&str> {
        match &self.family {
            FamilySettings::Transport { local_hostname } => local_hostname.as_deref(),
            _ => None,
        }
    }

    /// Sets the partial fetch flag. Returns false if this is not a store.
    pub const fn set_partial_fetch(&mut self, enabled: bool) -> bool {
        match &mut self.family {
            FamilySettings::Store { partial_fetch, .. } => {
                *partial_fetch = enabled;
                true
            }
            _ => false,
        }
    }

    /// Sets the separate store connection flag. Returns false if this is not a store.
    pub const fn set_separate_store_connection(&mut self, separate: bool) -> bool {
        match &mut self.family {
            FamilySettings::Store {
                separate_store_connection,
                ..
            } => {
                *separate_store_connection = separate;
                true
            }
            _ => false,
        }
    }

    /// Sets the announced local hostname. Returns false if this is not a transport.
    pub fn set_local_hostname(&mut self, hostname: impl Into<String>) -> bool {
        match &mut self.family {
            FamilySettings::Transport { local_hostname } => {
                *local_hostname = Some(hostname.into());
                true
            }
            _ => false,
        }
    }
}
