//! Mail service providers.
//!
//! A [`MailProvider`] turns a [`Session`] and a [`ConnectionTarget`] into a
//! connected store or transport. [`NetworkProvider`] is the real one, backed
//! by the `maillink-imap` and `maillink-smtp` crates.

use std::future::Future;

use maillink_imap::ImapStore;
use maillink_smtp::SmtpTransport;

use crate::account::ConnectionTarget;
use crate::error::Result;
use crate::properties::SessionProperties;
use crate::protocol::Protocol;

/// Snapshot of the properties a single connect attempt runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    protocol: Protocol,
    properties: SessionProperties,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub const fn new(protocol: Protocol, properties: SessionProperties) -> Self {
        Self {
            protocol,
            properties,
        }
    }

    /// Returns the protocol.
    #[must_use]
    pub const fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Returns the session properties.
    #[must_use]
    pub const fn properties(&self) -> &SessionProperties {
        &self.properties
    }

    /// Builds the IMAP configuration for `target`.
    #[must_use]
    pub fn imap_config(&self, target: &ConnectionTarget<'_>) -> maillink_imap::Config {
        let transport = &self.properties.transport;
        let security = if self.protocol.is_implicit_tls() {
            maillink_imap::Security::Implicit
        } else {
            maillink_imap::Security::StartTls
        };

        let mut builder = maillink_imap::Config::builder(target.host)
            .security(security)
            .allow_plaintext(transport.allow_plaintext)
            .local_address(transport.local_address)
            .remote_address(transport.remote_address)
            .connect_timeout(transport.connect_timeout)
            .io_timeout(transport.io_timeout)
            .partial_fetch(self.properties.partial_fetch().unwrap_or(true))
            .separate_store_connection(self.properties.separate_store_connection().unwrap_or(false))
            .debug(transport.debug);
        if target.port != 0 {
            builder = builder.port(target.port);
        }
        builder.build()
    }

    /// Builds the SMTP configuration for `target`.
    #[must_use]
    pub fn smtp_config(&self, target: &ConnectionTarget<'_>) -> maillink_smtp::Config {
        let transport = &self.properties.transport;
        let security = if self.protocol.is_implicit_tls() {
            maillink_smtp::Security::Implicit
        } else {
            maillink_smtp::Security::StartTls
        };

        let mut builder = maillink_smtp::Config::builder(target.host)
            .security(security)
            .allow_plaintext(transport.allow_plaintext)
            .local_address(transport.local_address)
            .remote_address(transport.remote_address)
            .connect_timeout(transport.connect_timeout)
            .io_timeout(transport.io_timeout)
            .debug(transport.debug);
        if let Some(hostname) = self.properties.local_hostname() {
            builder = builder.local_hostname(hostname);
        }
        if target.port != 0 {
            builder = builder.port(target.port);
        }
        builder.build()
    }
}

/// A connected message store.
pub trait MailStore: Send {
    /// Checks if the server advertised a capability.
    fn has_capability(&self, name: &str) -> bool;

    /// Exchanges client and server identification (RFC 2971).
    fn id(
        &mut self,
        params: &[(&str, &str)],
    ) -> impl Future<Output = Result<Option<Vec<(String, String)>>>> + Send;

    /// Closes the store.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// A connected message transport.
pub trait MailTransport: Send {
    /// Closes the transport.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens stores and transports.
pub trait MailProvider: Send + Sync {
    /// Store type.
    type Store: MailStore;
    /// Transport type.
    type Transport: MailTransport;

    /// Opens an authenticated store.
    fn open_store(
        &self,
        session: &Session,
        target: &ConnectionTarget<'_>,
    ) -> impl Future<Output = Result<Self::Store>> + Send;

    /// Opens an authenticated transport.
    fn open_transport(
        &self,
        session: &Session,
        target: &ConnectionTarget<'_>,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Provider backed by the workspace's IMAP and SMTP crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkProvider;

impl MailProvider for NetworkProvider {
    type Store = ImapStore;
    type Transport = SmtpTransport;

    async fn open_store(&self, session: &Session, target: &ConnectionTarget<'_>) -> Result<ImapStore> {
        let config = session.imap_config(target);
        Ok(ImapStore::connect(&config, target.user, target.password).await?)
    }

    async fn open_transport(
        &self,
        session: &Session,
        target: &ConnectionTarget<'_>,
    ) -> Result<SmtpTransport> {
        let config = session.smtp_config(target);
        Ok(SmtpTransport::connect(&config, target.user, target.password).await?)
    }
}

impl MailStore for ImapStore {
    fn has_capability(&self, name: &str) -> bool {
        Self::has_capability(self, name)
    }

    async fn id(&mut self, params: &[(&str, &str)]) -> Result<Option<Vec<(String, String)>>> {
        Ok(Self::id(self, params).await?)
    }

    async fn close(self) -> Result<()> {
        Ok(self.logout().await?)
    }
}

impl MailTransport for SmtpTransport {
    async fn close(self) -> Result<()> {
        Ok(self.quit().await?)
    }
}
