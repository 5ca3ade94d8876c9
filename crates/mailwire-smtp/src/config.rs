//! Connection configuration types.

use std::time::Duration;

/// Default high-water mark for queued outbound bytes.
pub const DEFAULT_WRITE_QUEUE_LIMIT: usize = 64 * 1024;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25). **Not recommended outside relays.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
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

/// SMTP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long the QUIT step waits for the server's reply.
    pub quit_timeout: Duration,
    /// Queued outbound bytes above which the write queue reports full.
    pub write_queue_limit: usize,
}

impl Config {
    /// Creates a new configuration using STARTTLS on port 587.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    quit_timeout: Duration,
    write_queue_limit: usize,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::StartTls,
            connect_timeout: Duration::from_secs(30),
            quit_timeout: Duration::from_secs(10),
            write_queue_limit: DEFAULT_WRITE_QUEUE_LIMIT,
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

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long QUIT waits for its reply before the socket is released.
    #[must_use]
    pub const fn quit_timeout(mut self, timeout: Duration) -> Self {
        self.quit_timeout = timeout;
        self
    }

    /// Sets the write queue high-water mark in bytes. Values below one byte
    /// are raised to one.
    #[must_use]
    pub const fn write_queue_limit(mut self, limit: usize) -> Self {
        self.write_queue_limit = if limit == 0 { 1 } else { limit };
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            quit_timeout: self.quit_timeout,
            write_queue_limit: self.write_queue_limit,
        }
    }
}
