//! # mailwire-smtp
//!
//! The connection layer of a pooled SMTP client.
//!
//! A [`Connection`] owns one socket to an SMTP server. It sends command
//! lines, reassembles reply blocks (including pipelined batches), upgrades to
//! TLS, parses EHLO capabilities and tracks its lifecycle for the pool that
//! owns it. Mail transactions, authentication and pooling policy are built on
//! top of it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use mailwire_smtp::{Config, NoopListener, driver};
//!
//! #[tokio::main]
//! async fn main() -> mailwire_smtp::Result<()> {
//!     let config = Config::new("smtp.example.com");
//!     let handle = driver::spawn(
//!         config,
//!         Arc::new(NoopListener),
//!         |conn, greeting| {
//!             println!("greeting: {greeting}");
//!             conn.write("EHLO client.example.com", None, |conn, reply| {
//!                 conn.parse_capabilities(&reply);
//!                 conn.return_to_pool();
//!                 conn.set_idle();
//!             });
//!         },
//!         |_conn, err| eprintln!("error: {err}"),
//!     );
//!
//!     let pipelining = handle
//!         .call(|conn| conn.capabilities().supports_pipelining())
//!         .await?;
//!     println!("pipelining: {pipelining}");
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Closed ─open─→ Connecting ─→ Active ⇄ Idle
//!                    │           │       │
//!                    ▼           ▼       ▼
//!                  Broken   ShuttingDown ─QUIT─→ Closed
//! ```
//!
//! ## Modules
//!
//! - [`connection`]: The connection state machine
//! - [`driver`]: Socket task and cross-task handle
//! - [`transport`]: Transport seam, TCP and TLS sockets
//! - [`parser`]: Reply line parser
//! - [`types`]: Core SMTP types (replies, extensions)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod assembler;
pub mod capabilities;
pub mod config;
pub mod connection;
pub mod driver;
mod error;
pub mod listener;
pub mod logging;
pub mod parser;
mod quit;
pub mod transport;
pub mod types;

pub use capabilities::Capabilities;
pub use config::{Config, ConfigBuilder, Security};
pub use connection::{Connection, ConnectionId, ConnectionState, ErrorHandler};
pub use driver::ConnectionHandle;
pub use error::{Error, Result};
pub use listener::{LifecycleListener, NoopListener};
pub use types::{AuthMechanism, Extension, Reply, ReplyCode};
