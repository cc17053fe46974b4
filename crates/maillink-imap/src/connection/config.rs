//! Connection configuration types.

use std::net::IpAddr;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// IMAP store configuration.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    /// Server hostname. Also used as the TLS server name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Stay in plaintext when STARTTLS is requested but not offered.
    pub allow_plaintext: bool,
    /// Local address to bind the socket to before connecting.
    pub local_address: Option<IpAddr>,
    /// Connect to this address instead of resolving `host`.
    pub remote_address: Option<IpAddr>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Whether partial body fetches may be used by the store's consumers.
    pub partial_fetch: bool,
    /// Whether folder administration should use its own socket.
    pub separate_store_connection: bool,
    /// Trace every command and response line.
    pub debug: bool,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    allow_plaintext: bool,
    local_address: Option<IpAddr>,
    remote_address: Option<IpAddr>,
    connect_timeout: Duration,
    io_timeout: Duration,
    partial_fetch: bool,
    separate_store_connection: bool,
    debug: bool,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            allow_plaintext: false,
            local_address: None,
            remote_address: None,
            connect_timeout: Duration::from_secs(20),
            io_timeout: Duration::from_secs(60),
            partial_fetch: true,
            separate_store_connection: false,
            debug: false,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Allows staying in plaintext when the server does not offer STARTTLS.
    #[must_use]
    pub const fn allow_plaintext(mut self, allow: bool) -> Self {
        self.allow_plaintext = allow;
        self
    }

    /// Binds the socket to a local address.
    #[must_use]
    pub const fn local_address(mut self, address: Option<IpAddr>) -> Self {
        self.local_address = address;
        self
    }

    /// Pins the remote address instead of resolving the host name.
    #[must_use]
    pub const fn remote_address(mut self, address: Option<IpAddr>) -> Self {
        self.remote_address = address;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Enables or disables partial body fetches.
    #[must_use]
    pub const fn partial_fetch(mut self, enabled: bool) -> Self {
        self.partial_fetch = enabled;
        self
    }

    /// Requests a separate socket for folder administration.
    #[must_use]
    pub const fn separate_store_connection(mut self, separate: bool) -> Self {
        self.separate_store_connection = separate;
        self
    }

    /// Enables protocol tracing.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            allow_plaintext: self.allow_plaintext,
            local_address: self.local_address,
            remote_address: self.remote_address,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            partial_fetch: self.partial_fetch,
            separate_store_connection: self.separate_store_connection,
            debug: self.debug,
        }
    }
}
