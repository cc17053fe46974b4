//! Transport configuration.

use std::net::IpAddr;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25).
    None,
    /// Plaintext upgraded with STARTTLS (port 587).
    #[default]
    StartTls,
    /// Implicit TLS (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// SMTP transport configuration.
#[derive(Debug, Clone)]
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
    /// Name announced in EHLO.
    pub local_hostname: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Trace every command and reply line.
    pub debug: bool,
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    port: Option<u16>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: Config {
                host: host.into(),
                port: 0,
                security: Security::StartTls,
                allow_plaintext: false,
                local_address: None,
                remote_address: None,
                local_hostname: "localhost".to_string(),
                connect_timeout: Duration::from_secs(20),
                io_timeout: Duration::from_secs(60),
                debug: false,
            },
            port: None,
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
        self.config.security = security;
        self
    }

    /// Allows staying in plaintext when the server does not offer STARTTLS.
    #[must_use]
    pub const fn allow_plaintext(mut self, allow: bool) -> Self {
        self.config.allow_plaintext = allow;
        self
    }

    /// Binds the socket to a local address.
    #[must_use]
    pub const fn local_address(mut self, address: Option<IpAddr>) -> Self {
        self.config.local_address = address;
        self
    }

    /// Pins the remote address instead of resolving the host name.
    #[must_use]
    pub const fn remote_address(mut self, address: Option<IpAddr>) -> Self {
        self.config.remote_address = address;
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn local_hostname(mut self, name: impl Into<String>) -> Self {
        self.config.local_hostname = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Enables protocol tracing.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let port = self
            .port
            .unwrap_or_else(|| self.config.security.default_port());
        Config { port, ..self.config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .local_hostname("[192.0.2.10]")
            .build();
        assert_eq!(config.port, 465);
        assert_eq!(config.local_hostname, "[192.0.2.10]");
        assert!(config.local_address.is_none());

        let config = Config::builder("smtp.example.com").port(2525).build();
        assert_eq!(config.port, 2525);
        assert_eq!(config.local_hostname, "localhost");
    }
}
