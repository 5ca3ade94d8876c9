#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Probe an SMTP server's capabilities
//!
//! Connects, reads the greeting, sends EHLO, upgrades with STARTTLS when
//! offered, prints the capability table and closes with QUIT.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailwire_smtp=debug cargo run --package mailwire-smtp --example probe -- smtp.example.com 587
//! ```

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailwire_smtp::{Capabilities, Config, Connection, NoopListener, Security, driver};

fn ehlo(conn: &mut Connection, done: oneshot::Sender<Capabilities>, try_tls: bool) {
    conn.write("EHLO probe.localhost", None, move |conn, reply| {
        if !reply.is_success() {
            eprintln!("EHLO rejected: {reply}");
            conn.close();
            return;
        }
        conn.parse_capabilities(&reply);
        if try_tls && conn.capabilities().supports_starttls() {
            conn.write("STARTTLS", None, move |conn, reply| {
                if !reply.is_success() {
                    eprintln!("STARTTLS rejected: {reply}");
                    conn.close();
                    return;
                }
                conn.upgrade_to_secure(move |conn, result| match result {
                    Ok(()) => ehlo(conn, done, false),
                    Err(err) => eprintln!("TLS upgrade failed: {err}"),
                });
            });
        } else {
            let _ = done.send(conn.capabilities().clone());
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwire_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().map_or(Ok(587), |p| p.parse())?;
    let security = if port == 465 {
        Security::Implicit
    } else {
        Security::StartTls
    };
    let config = Config::builder(host).port(port).security(security).build();
    println!("Probing {}", config.address());

    let (done, caps) = oneshot::channel();
    let handle = driver::spawn(
        config,
        Arc::new(NoopListener),
        move |conn, greeting| {
            println!("Greeting: {greeting}");
            ehlo(conn, done, security == Security::StartTls);
        },
        |_conn, err| eprintln!("Connection error: {err}"),
    );

    match caps.await {
        Ok(caps) => {
            let secure = handle.call(|conn| conn.is_secure()).await?;
            println!("Server:     {}", caps.hostname);
            println!("Encrypted:  {secure}");
            println!("Pipelining: {}", caps.supports_pipelining());
            println!("8BITMIME:   {}", caps.supports_8bitmime());
            println!("Max size:   {:?}", caps.max_message_size());
            let mechanisms: Vec<&str> = caps.auth_mechanisms().iter().map(|m| m.as_str()).collect();
            println!("AUTH:       {}", mechanisms.join(" "));
        }
        Err(_) => eprintln!("Probe did not complete"),
    }

    if handle.run(Connection::close).is_ok() {
        handle.finished().await;
    }
    Ok(())
}
