//! Connection establishment with local interface fallback.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use crate::account::{Account, AppIdentity, ConnectionTarget, Identity};
use crate::candidates::candidates;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::{Error, Result};
use crate::network::{AddressFamily, NetworkStack, SystemNetwork, address_literal};
use crate::properties::SessionProperties;
use crate::protocol::{Protocol, ServiceFamily};
use crate::provider::{MailProvider, MailStore, MailTransport, NetworkProvider, Session};

/// Local and remote address of one fallback attempt.
#[derive(Debug, Clone, Copy)]
struct Binding {
    local: IpAddr,
    remote: IpAddr,
}

/// The live store or transport of an establisher.
pub enum ActiveConnection<P: MailProvider> {
    /// Connected store.
    Store(P::Store),
    /// Connected transport.
    Transport(P::Transport),
}

impl<P: MailProvider> ActiveConnection<P> {
    /// Returns the service family of the connection.
    #[must_use]
    pub const fn family(&self) -> ServiceFamily {
        match self {
            Self::Store(_) => ServiceFamily::Store,
            Self::Transport(_) => ServiceFamily::Transport,
        }
    }

    async fn release(self) -> Result<()> {
        match self {
            Self::Store(store) => store.close().await,
            Self::Transport(transport) => transport.close().await,
        }
    }
}

impl<P: MailProvider> fmt::Debug for ActiveConnection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveConnection")
            .field(&self.family())
            .finish()
    }
}

/// Opens a store or transport for one protocol, retrying over alternate
/// local interfaces when the direct connect fails at the socket level.
///
/// # Example
///
/// ```ignore
/// use maillink_core::ConnectionEstablisher;
///
/// let mut establisher = ConnectionEstablisher::new("imaps", false, false);
/// establisher.set_partial_fetch(false);
/// establisher
///     .connect("imap.example.com", 993, "user@example.com", "password")
///     .await?;
/// let store = establisher.store()?;
/// establisher.close().await?;
/// ```
pub struct ConnectionEstablisher<P: MailProvider = NetworkProvider, N = SystemNetwork> {
    protocol: Protocol,
    insecure: bool,
    debug: bool,
    properties: SessionProperties,
    session: Option<Session>,
    connection: Option<ActiveConnection<P>>,
    server_identity: Option<Vec<(String, String)>>,
    closed: bool,
    provider: P,
    network: N,
    diagnostics: Arc<dyn Diagnostics>,
    app: AppIdentity,
}

impl ConnectionEstablisher<NetworkProvider, SystemNetwork> {
    /// Creates an establisher for `protocol` (`imap`, `imaps`, `smtp` or `smtps`).
    ///
    /// `insecure` tolerates servers that do not offer STARTTLS; `debug`
    /// traces every protocol line.
    #[must_use]
    pub fn new(protocol: impl Into<Protocol>, insecure: bool, debug: bool) -> Self {
        let protocol = protocol.into();
        Self {
            properties: SessionProperties::for_protocol(&protocol, insecure, debug),
            protocol,
            insecure,
            debug,
            session: None,
            connection: None,
            server_identity: None,
            closed: false,
            provider: NetworkProvider,
            network: SystemNetwork,
            diagnostics: Arc::new(TracingDiagnostics),
            app: AppIdentity::default(),
        }
    }
}

impl<P, N> ConnectionEstablisher<P, N>
where
    P: MailProvider,
    N: NetworkStack,
{
    /// Replaces the mail provider. Use before connecting.
    #[must_use]
    pub fn with_provider<Q: MailProvider>(self, provider: Q) -> ConnectionEstablisher<Q, N> {
        ConnectionEstablisher {
            protocol: self.protocol,
            insecure: self.insecure,
            debug: self.debug,
            properties: self.properties,
            session: None,
            connection: None,
            server_identity: None,
            closed: self.closed,
            provider,
            network: self.network,
            diagnostics: self.diagnostics,
            app: self.app,
        }
    }

    /// Replaces the network stack.
    #[must_use]
    pub fn with_network<M: NetworkStack>(self, network: M) -> ConnectionEstablisher<P, M> {
        ConnectionEstablisher {
            protocol: self.protocol,
            insecure: self.insecure,
            debug: self.debug,
            properties: self.properties,
            session: self.session,
            connection: self.connection,
            server_identity: self.server_identity,
            closed: self.closed,
            provider: self.provider,
            network,
            diagnostics: self.diagnostics,
            app: self.app,
        }
    }

    /// Replaces the diagnostics sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Sets the name and version announced to IMAP servers.
    #[must_use]
    pub fn with_app_identity(mut self, app: AppIdentity) -> Self {
        self.app = app;
        self
    }

    /// Returns the configured protocol.
    #[must_use]
    pub const fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Returns the current session properties.
    #[must_use]
    pub const fn properties(&self) -> &SessionProperties {
        &self.properties
    }

    /// Returns the session of the active connection.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns true if a store or transport is connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns what the IMAP server reported about itself, if it did.
    #[must_use]
    pub fn server_identity(&self) -> Option<&[(String, String)]> {
        self.server_identity.as_deref()
    }

    /// Enables or disables partial body fetches. Stores only.
    pub fn set_partial_fetch(&mut self, enabled: bool) {
        if !self.properties.set_partial_fetch(enabled) {
            tracing::debug!(protocol = %self.protocol, "Partial fetch ignored, not a store");
        }
    }

    /// Sets the host name announced in EHLO. Transports only.
    ///
    /// When `enabled`, announces this machine's own address in the family
    /// `host` resolves to, as an address literal (`[192.0.2.1]` or
    /// `[IPv6:2001:db8::1]`). Otherwise announces `host` verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] if `host` or the local address cannot be determined.
    pub async fn set_use_ip(&mut self, enabled: bool, host: &str) -> Result<()> {
        let hostname = if enabled {
            let remote = self
                .network
                .resolve(host)
                .await
                .and_then(|addresses| {
                    addresses.first().copied().ok_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "no addresses")
                    })
                })
                .map_err(|source| Error::Resolution {
                    host: host.to_string(),
                    source,
                })?;
            let local = self
                .network
                .local_address(AddressFamily::of(&remote))
                .map_err(|source| Error::Resolution {
                    host: "localhost".to_string(),
                    source,
                })?;
            address_literal(local)
        } else {
            host.to_string()
        };

        tracing::info!(localhost = %hostname, "Announced local host name");
        if !self.properties.set_local_hostname(hostname) {
            tracing::debug!(protocol = %self.protocol, "Local host name ignored, not a transport");
        }
        Ok(())
    }

    /// Requests a separate socket for folder administration. Stores only.
    pub fn set_separate_store_connection(&mut self) {
        if !self.properties.set_separate_store_connection(true) {
            tracing::debug!(protocol = %self.protocol, "Separate store connection ignored, not a store");
        }
    }

    /// Connects using an account's incoming server.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_account(&mut self, account: &Account) -> Result<()> {
        let server = &account.server;
        self.connect(&server.host, server.port, &server.user, &server.password)
            .await
    }

    /// Connects using an identity's outgoing server.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_identity(&mut self, identity: &Identity) -> Result<()> {
        let server = &identity.server;
        self.connect(&server.host, server.port, &server.user, &server.password)
            .await
    }

    /// Connects and authenticates.
    ///
    /// If the direct connect fails at the socket level and `host` resolves
    /// to more than one address, each remote address is retried bound to
    /// every same-family address of every up, non-loopback interface. The
    /// first success wins. When nothing connects, the error of the direct
    /// attempt is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close),
    /// [`Error::UnsupportedProvider`] for protocols without a provider, and
    /// otherwise the error of the direct attempt.
    pub async fn connect(&mut self, host: &str, port: u16, user: &str, password: &str) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if let Some(previous) = self.connection.take() {
            self.session = None;
            self.server_identity = None;
            if let Err(e) = previous.release().await {
                tracing::warn!(error = %e, "Failed to release previous connection");
            }
        }

        let target = ConnectionTarget {
            host,
            port,
            user,
            password,
        };

        let original = match self.connect_once(&target, None).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_connect_failure() => e,
            Err(e) => return Err(e),
        };
        tracing::warn!(host, port, error = %original, "Connect failed, trying local interfaces");

        match self.connect_bound(&target).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(original),
            Err(e) => {
                tracing::warn!(host, error = %e, "Interface fallback unavailable");
                Err(original)
            }
        }
    }

    /// Retries `target` over every candidate pair. Returns whether one connected.
    async fn connect_bound(&mut self, target: &ConnectionTarget<'_>) -> io::Result<bool> {
        let remotes = self.network.resolve(target.host).await?;
        if remotes.len() == 1 {
            return Ok(false);
        }

        let interfaces = self.network.interfaces()?;
        for candidate in candidates(&remotes, &interfaces) {
            tracing::info!(
                remote = %candidate.remote,
                interface = candidate.interface,
                local = %candidate.local,
                "Binding to local address"
            );

            let binding = Binding {
                local: candidate.local,
                remote: candidate.remote,
            };
            match self.connect_once(target, Some(binding)).await {
                Ok(()) => return Ok(true),
                Err(e) => tracing::warn!(
                    remote = %candidate.remote,
                    local = %candidate.local,
                    error = %e,
                    "Bound connect failed"
                ),
            }
        }
        Ok(false)
    }

    /// Builds a session from the current properties and opens the service.
    ///
    /// A binding applies to this attempt's session only.
    async fn connect_once(
        &mut self,
        target: &ConnectionTarget<'_>,
        binding: Option<Binding>,
    ) -> Result<()> {
        let family = self
            .protocol
            .family()
            .ok_or_else(|| Error::UnsupportedProvider(self.protocol.name().to_string()))?;
        let mut properties = self.properties.clone();
        if let Some(binding) = binding {
            properties.transport.local_address = Some(binding.local);
            properties.transport.remote_address = Some(binding.remote);
        }
        let session = Session::new(self.protocol.clone(), properties);

        let connection = match family {
            ServiceFamily::Store => {
                let mut store = self.provider.open_store(&session, target).await?;
                if store.has_capability("ID") {
                    self.identify(&mut store).await;
                }
                ActiveConnection::Store(store)
            }
            ServiceFamily::Transport => {
                ActiveConnection::Transport(self.provider.open_transport(&session, target).await?)
            }
        };

        self.session = Some(session);
        self.connection = Some(connection);
        Ok(())
    }

    /// Exchanges RFC 2971 identification. Failures are only logged.
    async fn identify(&mut self, store: &mut P::Store) {
        let params = [
            ("name", self.app.name.as_str()),
            ("version", self.app.version.as_str()),
        ];
        match store.id(&params).await {
            Ok(Some(fields)) => {
                for (key, value) in &fields {
                    self.diagnostics.log(&format!("Server {key}={value}"));
                }
                self.diagnostics.breadcrumb("server", &fields);
                self.server_identity = Some(fields);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Server identification failed"),
        }
    }

    /// Releases the active connection and invalidates the establisher.
    ///
    /// State is cleared before the connection is released, so it is gone
    /// even when releasing fails. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the error from releasing the connection.
    pub async fn close(&mut self) -> Result<()> {
        let connection = self.connection.take();
        self.session = None;
        self.server_identity = None;
        self.properties = SessionProperties::for_protocol(&self.protocol, self.insecure, self.debug);
        self.closed = true;

        match connection {
            Some(connection) => connection.release().await,
            None => Ok(()),
        }
    }

    /// Returns the connected store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before connecting and
    /// [`Error::WrongServiceKind`] for transport protocols.
    pub fn store(&mut self) -> Result<&mut P::Store> {
        let protocol = self.protocol.name().to_string();
        match self.connection.as_mut() {
            Some(ActiveConnection::Store(store)) => Ok(store),
            Some(ActiveConnection::Transport(_)) => Err(Error::WrongServiceKind {
                protocol,
                requested: ServiceFamily::Store.as_str(),
            }),
            None => Err(Error::NotConnected),
        }
    }

    /// Returns the connected transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before connecting and
    /// [`Error::WrongServiceKind`] for store protocols.
    pub fn transport(&mut self) -> Result<&mut P::Transport> {
        let protocol = self.protocol.name().to_string();
        match self.connection.as_mut() {
            Some(ActiveConnection::Transport(transport)) => Ok(transport),
            Some(ActiveConnection::Store(_)) => Err(Error::WrongServiceKind {
                protocol,
                requested: ServiceFamily::Transport.as_str(),
            }),
            None => Err(Error::NotConnected),
        }
    }
}

impl<P: MailProvider, N> fmt::Debug for ConnectionEstablisher<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEstablisher")
            .field("protocol", &self.protocol)
            .field("properties", &self.properties)
            .field("connection", &self.connection)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
