//! Authenticated IMAP store.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::{Command, TagGenerator};
use crate::connection::{self, Config, FramedStream, ImapStream, Security};
use crate::response::{Capabilities, Response, ResponseParser, Status, Untagged};
use crate::{Error, Result};

/// An IMAP connection.
///
/// [`ImapStore::connect`] only hands out stores that are logged in.
pub struct ImapStore<S = ImapStream> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    capabilities: Capabilities,
    authenticated: bool,
    partial_fetch: bool,
    separate_store_connection: bool,
    debug: bool,
}

impl<S> std::fmt::Debug for ImapStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("authenticated", &self.authenticated)
            .field("partial_fetch", &self.partial_fetch)
            .finish_non_exhaustive()
    }
}

impl ImapStore<ImapStream> {
    /// Opens a store: connect, read the greeting, upgrade with STARTTLS
    /// when configured, then LOGIN.
    ///
    /// A PREAUTH greeting skips both STARTTLS and LOGIN (RFC 9051 §7.1.4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the socket cannot be connected, and
    /// other variants for TLS, protocol and authentication failures.
    pub async fn connect(config: &Config, username: &str, password: &str) -> Result<Self> {
        let stream = connection::connect(config).await?;
        let mut store = Self::from_stream(stream, config).await?;

        if store.authenticated {
            if config.security == Security::StartTls && !config.allow_plaintext {
                return Err(Error::NotSupported("STARTTLS after PREAUTH".into()));
            }
            tracing::info!(host = %config.host, "Server pre-authenticated the connection");
            return Ok(store);
        }

        if config.security == Security::StartTls {
            store = store.starttls(&config.host, config.allow_plaintext).await?;
        }

        store.login(username, password).await?;
        Ok(store)
    }

    async fn starttls(mut self, host: &str, allow_plaintext: bool) -> Result<Self> {
        if self.capabilities.is_empty() {
            self.capability().await?;
        }
        if !self.capabilities.contains("STARTTLS") {
            if allow_plaintext {
                tracing::warn!(host, "STARTTLS not offered, continuing without TLS");
                return Ok(self);
            }
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let tag = self.tag_gen.next();
        self.send(&tag, &Command::StartTls).await?;
        self.read_until_tagged(&tag).await?;

        let io_timeout = self.stream.io_timeout();
        let tls = self.stream.into_inner().upgrade_to_tls(host).await?;
        let mut store = Self {
            stream: FramedStream::new(tls, io_timeout),
            capabilities: Capabilities::default(),
            ..self
        };
        // Capabilities seen before the upgrade must be discarded (RFC 9051 §6.2.1).
        store.capability().await?;
        Ok(store)
    }
}

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is BYE or cannot be read.
    pub async fn from_stream(stream: S, config: &Config) -> Result<Self> {
        let mut framed = FramedStream::new(stream, config.io_timeout);
        let greeting = framed.read_response().await?;
        if config.debug {
            tracing::debug!(line = %String::from_utf8_lossy(&greeting).trim_end(), "S:");
        }

        let (capabilities, authenticated) = match ResponseParser::parse(&greeting)? {
            Response::Untagged(Untagged::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            Response::Untagged(Untagged::Status {
                status,
                capabilities,
                ..
            }) => (capabilities.unwrap_or_default(), status == Status::PreAuth),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            authenticated,
            partial_fetch: config.partial_fetch,
            separate_store_connection: config.separate_store_connection,
            debug: config.debug,
        })
    }

    /// Returns the server capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    /// Whether the session is authenticated, by LOGIN or a PREAUTH greeting.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether partial body fetches are enabled for this store.
    #[must_use]
    pub const fn partial_fetch(&self) -> bool {
        self.partial_fetch
    }

    /// Whether folder administration should open its own socket.
    #[must_use]
    pub const fn separate_store_connection(&self) -> bool {
        self.separate_store_connection
    }

    /// Refreshes the capability list.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn capability(&mut self) -> Result<&Capabilities> {
        let tag = self.tag_gen.next();
        self.send(&tag, &Command::Capability).await?;
        self.read_until_tagged(&tag).await?;
        Ok(&self.capabilities)
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if self.has_capability("LOGINDISABLED") {
            return Err(Error::Auth("LOGIN is disabled by the server".into()));
        }

        let tag = self.tag_gen.next();
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send(&tag, &command).await?;

        match self.read_until_tagged(&tag).await {
            Err(Error::No(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
            Ok(_) => {
                self.authenticated = true;
                Ok(())
            }
        }
    }

    /// Exchanges client and server identification (RFC 2971).
    ///
    /// Returns the fields the server reported, or `None` if it answered NIL.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn id(&mut self, params: &[(&str, &str)]) -> Result<Option<Vec<(String, String)>>> {
        let params = params
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();

        let tag = self.tag_gen.next();
        self.send(&tag, &Command::Id(Some(params))).await?;

        let mut server = None;
        for response in self.read_until_tagged(&tag).await? {
            if let Response::Untagged(Untagged::Id(fields)) = response {
                server = fields;
            }
        }
        Ok(server)
    }

    /// Logs out and shuts the connection down.
    ///
    /// # Errors
    ///
    /// Returns an error if the LOGOUT exchange fails.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.send(&tag, &Command::Logout).await?;

        // The server sends BYE before the tagged OK; either ends the session.
        match self.read_until_tagged(&tag).await {
            Ok(_) | Err(Error::Io(_)) => {}
            Err(e) => return Err(e),
        }
        self.stream.shutdown().await
    }

    async fn send(&mut self, tag: &str, command: &Command) -> Result<()> {
        let data = command.serialize(tag)?;
        if self.debug {
            tracing::debug!(line = %command.redacted(tag), "C:");
        }
        self.stream.write_command(&data).await
    }

    /// Reads responses until the tagged completion for `tag`, returning
    /// the untagged ones. Capability updates are applied on the way.
    async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Response>> {
        let mut untagged = Vec::new();

        loop {
            let raw = self.stream.read_response().await?;
            if self.debug {
                tracing::debug!(line = %String::from_utf8_lossy(&raw).trim_end(), "S:");
            }

            match ResponseParser::parse(&raw)? {
                Response::Tagged {
                    tag: got,
                    status,
                    capabilities,
                    text,
                } if got == tag => {
                    if let Some(caps) = capabilities {
                        self.capabilities = caps;
                    }
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(untagged),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Tagged { tag: got, .. } => {
                    tracing::warn!(expected = tag, got, "Ignoring response for another tag");
                }
                Response::Untagged(Untagged::Capability(caps)) => self.capabilities = caps,
                Response::Untagged(Untagged::Status {
                    status,
                    capabilities: Some(caps),
                    text,
                }) => {
                    self.capabilities = caps;
                    untagged.push(Response::Untagged(Untagged::Status {
                        status,
                        capabilities: None,
                        text,
                    }));
                }
                other => untagged.push(other),
            }
        }
    }
}
