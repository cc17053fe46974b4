//! Low-level SMTP stream handling.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use super::{Config, Security};
use crate::error::{Error, Result};

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        match self {
            Self::Tcp(tcp) => Ok(Self::Tls(Box::new(handshake(hostname, tcp).await?))),
            Self::Tls(_) => Err(Error::Protocol("Already using TLS".into())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns the local address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is no longer connected.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Tcp(tcp) => tcp.local_addr(),
            Self::Tls(tls) => tls.get_ref().0.local_addr(),
        }
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects to the server described by `config`.
///
/// Implicit TLS is negotiated here; STARTTLS is left to the transport.
///
/// # Errors
///
/// Returns [`Error::Connect`] if no socket could be connected.
pub async fn connect(config: &Config) -> Result<SmtpStream> {
    let tcp = open_tcp(config).await?;
    if config.security == Security::Implicit {
        let tls = handshake(&config.host, tcp).await?;
        return Ok(SmtpStream::Tls(Box::new(tls)));
    }
    Ok(SmtpStream::Tcp(tcp))
}

async fn open_tcp(config: &Config) -> Result<TcpStream> {
    let candidates: Vec<SocketAddr> = match config.remote_address {
        Some(remote) => vec![SocketAddr::new(remote, config.port)],
        None => tokio::net::lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|source| Error::Resolve {
                host: config.host.clone(),
                source,
            })?
            .filter(|addr| {
                config
                    .local_address
                    .is_none_or(|local| local.is_ipv4() == addr.is_ipv4())
            })
            .collect(),
    };

    let mut last_error = None;
    for address in candidates {
        match connect_one(address, config).await {
            Ok(tcp) => return Ok(tcp),
            Err(source) => {
                tracing::debug!(%address, ?source, "TCP connect failed");
                last_error = Some(Error::Connect { address, source });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Resolve {
        host: config.host.clone(),
        source: io::Error::new(io::ErrorKind::NotFound, "no usable address"),
    }))
}

async fn connect_one(address: SocketAddr, config: &Config) -> io::Result<TcpStream> {
    let socket = match address.ip() {
        IpAddr::V4(_) => TcpSocket::new_v4()?,
        IpAddr::V6(_) => TcpSocket::new_v6()?,
    };
    if let Some(local) = config.local_address {
        socket.bind(SocketAddr::new(local, 0))?;
    }

    match tokio::time::timeout(config.connect_timeout, socket.connect(address)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    }
}

async fn handshake(hostname: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;
    Ok(create_tls_connector().connect(server_name, tcp).await?)
}

/// Creates a TLS connector with system root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
