//! Error types for SMTP connection operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP connection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP connection error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (malformed reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer closed the socket while the connection was in use.
    #[error("connection was closed by server")]
    ClosedByServer,

    /// No live transport (connecting, broken or already shut down).
    #[error("connection is not open")]
    NotConnected,

    /// Connect did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Hostname is not usable as a TLS server name.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Invalid state for operation.
    #[error("state error: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the error came from the network rather than from
    /// misuse of the connection.
    #[must_use]
    pub const fn is_network_fault(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::ClosedByServer | Self::ConnectTimeout(_)
        )
    }
}
