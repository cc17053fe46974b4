//! Connected SMTP transport.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::command::{AuthMechanism, Command};
use crate::connection::{self, Config, Security, SmtpStream};
use crate::error::{Error, Result};
use crate::reply::{Reply, ReplyCode, is_last_reply_line};

/// Upper bound on lines in one reply.
const MAX_REPLY_LINES: usize = 512;

/// Server capabilities from the greeting and EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// EHLO keyword lines, e.g. `STARTTLS` or `AUTH PLAIN LOGIN`.
    pub extensions: Vec<String>,
}

impl ServerInfo {
    fn from_ehlo(hostname: String, reply: &Reply) -> Self {
        Self {
            hostname,
            extensions: reply.message.iter().skip(1).cloned().collect(),
        }
    }

    /// Checks if the server advertised an extension keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.extensions.iter().any(|line| {
            line.split_ascii_whitespace()
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
        })
    }

    /// Returns the advertised authentication mechanisms this crate can use.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .filter_map(|line| {
                let mut words = line.split_ascii_whitespace();
                words
                    .next()
                    .filter(|k| k.eq_ignore_ascii_case("AUTH"))
                    .map(|_| words.filter_map(AuthMechanism::parse).collect::<Vec<_>>())
            })
            .flatten()
            .collect()
    }
}

/// A connected SMTP transport.
#[derive(Debug)]
pub struct SmtpTransport<S = SmtpStream> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    io_timeout: Duration,
    debug: bool,
}

impl SmtpTransport<SmtpStream> {
    /// Opens a transport: connect, greeting, EHLO, STARTTLS when
    /// configured, then AUTH if a username is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the socket cannot be connected, and
    /// other variants for TLS, protocol and authentication failures.
    pub async fn connect(config: &Config, username: &str, password: &str) -> Result<Self> {
        let stream = connection::connect(config).await?;
        let mut transport = Self::from_stream(stream, config).await?;
        transport.ehlo(&config.local_hostname).await?;

        if config.security == Security::StartTls {
            transport = transport.starttls(config).await?;
        }

        if !username.is_empty() {
            transport.authenticate(username, password).await?;
        }
        Ok(transport)
    }

    async fn starttls(mut self, config: &Config) -> Result<Self> {
        if !self.server_info.supports("STARTTLS") {
            if config.allow_plaintext {
                tracing::warn!(host = %config.host, "STARTTLS not offered, continuing without TLS");
                return Ok(self);
            }
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        let stream = self.reader.into_inner().upgrade_to_tls(&config.host).await?;
        let mut transport = Self {
            reader: BufReader::new(stream),
            ..self
        };
        // Extensions must be rediscovered over TLS.
        transport.ehlo(&config.local_hostname).await?;
        Ok(transport)
    }
}

impl<S> SmtpTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses service.
    pub async fn from_stream(stream: S, config: &Config) -> Result<Self> {
        let mut transport = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo::default(),
            io_timeout: config.io_timeout,
            debug: config.debug,
        };

        let greeting = transport.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        transport.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        Ok(transport)
    }

    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(&mut self, local_hostname: &str) -> Result<()> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: local_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.server_info = ServerInfo::from_ehlo(std::mem::take(&mut self.server_info.hostname), &reply);
        Ok(())
    }

    /// Authenticates with PLAIN, or LOGIN when PLAIN is not offered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials and
    /// [`Error::NotSupported`] if no usable mechanism is advertised.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let mechanisms = self.server_info.auth_mechanisms();
        let reply = if mechanisms.contains(&AuthMechanism::Plain) {
            let credentials = format!("\0{username}\0{password}");
            self.send_command(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(STANDARD.encode(credentials)),
            })
            .await?
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password).await?
        } else {
            return Err(Error::NotSupported("AUTH PLAIN or LOGIN".into()));
        };

        if reply.code == ReplyCode::AUTH_SUCCEEDED {
            Ok(())
        } else {
            Err(Error::Auth {
                code: reply.code.as_u16(),
                message: reply.message_text(),
            })
        }
    }

    async fn auth_login(&mut self, username: &str, password: &str) -> Result<Reply> {
        let mut reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;

        for secret in [username, password] {
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Ok(reply);
            }
            reply = self
                .send_command(&Command::SaslResponse(STANDARD.encode(secret)))
                .await?;
        }
        Ok(reply)
    }

    /// Sends QUIT and shuts the connection down.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }
        let timeout = self.io_timeout;
        with_timeout(timeout, self.reader.get_mut().shutdown()).await
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        if self.debug {
            tracing::debug!(line = %cmd.redacted(), "C:");
        }
        let data = cmd.serialize();
        let timeout = self.io_timeout;
        let stream = self.reader.get_mut();
        with_timeout(timeout, stream.write_all(&data)).await?;
        with_timeout(timeout, stream.flush()).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let timeout = self.io_timeout;
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = with_timeout(timeout, self.reader.read_line(&mut line)).await?;
            if read == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            let line = line.trim_end().to_string();
            if line.is_empty() {
                continue;
            }
            if self.debug {
                tracing::debug!(line = %line, "S:");
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
            if lines.len() > MAX_REPLY_LINES {
                return Err(Error::Protocol("reply too long".into()));
            }
        }

        Reply::parse(&lines)
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    operation: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}
