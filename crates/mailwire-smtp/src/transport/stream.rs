//! TCP and TLS sockets.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore},
};

use crate::config::{Config, Security};
use crate::error::{Error, Result};

/// Socket to an SMTP server (TCP or TLS).
#[derive(Debug)]
pub enum NetStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl NetStream {
    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the TLS
    /// handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(stream) => stream,
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };
        handshake(hostname, tcp_stream).await
    }
}

impl AsyncRead for NetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens the socket described by `config`, with implicit TLS when
/// [`Security::Implicit`] is selected.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails, or if it does
/// not complete within the configured connect timeout.
pub async fn open(config: &Config) -> Result<NetStream> {
    let attempt = async {
        match config.security {
            Security::Implicit => connect_tls(&config.host, config.port).await,
            Security::None | Security::StartTls => connect(&config.host, config.port).await,
        }
    };
    tokio::time::timeout(config.connect_timeout, attempt)
        .await
        .map_err(|_| Error::ConnectTimeout(config.connect_timeout))?
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<NetStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    stream.set_nodelay(true)?;
    Ok(NetStream::Tcp(stream))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<NetStream> {
    let tcp_stream = TcpStream::connect((hostname, port)).await?;
    handshake(hostname, tcp_stream).await
}

async fn handshake(hostname: &str, tcp_stream: TcpStream) -> Result<NetStream> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::InvalidHostname(hostname.to_string()))?;
    let tls_stream = create_tls_connector()
        .connect(server_name, tcp_stream)
        .await?;
    Ok(NetStream::Tls(Box::new(tls_stream)))
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
