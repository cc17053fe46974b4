//! Stream types for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::Config;
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream to TLS using STARTTLS.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let tls = handshake(host, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::InvalidState("Stream is already TLS".to_string())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns the local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain(tcp) => tcp.local_addr(),
            Self::Tls(tls) => tls.get_ref().0.local_addr(),
        }
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStream")
            .field("tls", &self.is_tls())
            .field("local_addr", &self.local_addr().ok())
            .finish()
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with default root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())?;
    Ok(create_tls_connector().connect(server_name, tcp).await?)
}

/// Opens the socket described by `config`, with TLS from the start when
/// the security mode asks for it.
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let tcp = open_tcp(config).await?;
    match config.security {
        super::Security::Implicit => {
            let tls = handshake(&config.host, tcp).await?;
            Ok(ImapStream::Tls(Box::new(tls)))
        }
        super::Security::StartTls | super::Security::None => Ok(ImapStream::Plain(tcp)),
    }
}

/// Returns the remote addresses to try, in order.
async fn remote_addresses(config: &Config) -> Result<Vec<SocketAddr>> {
    if let Some(remote) = config.remote_address {
        return Ok(vec![SocketAddr::new(remote, config.port)]);
    }

    let resolved = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|source| Error::Resolve {
            host: config.host.clone(),
            source,
        })?;

    // A bound socket can only reach peers of its own family.
    let addresses: Vec<SocketAddr> = resolved
        .filter(|addr| {
            config
                .local_address
                .is_none_or(|local| local.is_ipv4() == addr.is_ipv4())
        })
        .collect();

    if addresses.is_empty() {
        return Err(Error::Resolve {
            host: config.host.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no usable address"),
        });
    }
    Ok(addresses)
}

async fn open_tcp(config: &Config) -> Result<TcpStream> {
    let mut last_error = None;

    for address in remote_addresses(config).await? {
        match connect_one(address, config).await {
            Ok(stream) => return Ok(stream),
            Err(source) => {
                tracing::debug!(%address, ?source, "TCP connect failed");
                last_error = Some(Error::Connect { address, source });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::InvalidState("no address attempted".into())))
}

async fn connect_one(address: SocketAddr, config: &Config) -> io::Result<TcpStream> {
    let socket = match address.ip() {
        IpAddr::V4(_) => TcpSocket::new_v4()?,
        IpAddr::V6(_) => TcpSocket::new_v6()?,
    };
    if let Some(local) = config.local_address {
        socket.bind(SocketAddr::new(local, 0))?;
    }

    tokio::time::timeout(config.connect_timeout, socket.connect(address))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?
}
