//! Command logging tests.
//!
//! A `tracing_subscriber` writer captures what the connection logs so the
//! masking of credentials can be checked on the real output.

#![allow(clippy::unwrap_used)]

use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use mailwire_smtp::transport::Transport;
use mailwire_smtp::{Config, Connection, NoopListener};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Transport that keeps what was written.
#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Transport for Sink {
    fn write(&mut self, data: Bytes) -> mailwire_smtp::Result<()> {
        self.0.lock().unwrap().extend_from_slice(&data);
        Ok(())
    }

    fn is_write_queue_full(&self) -> bool {
        false
    }

    fn is_secure(&self) -> bool {
        false
    }

    fn upgrade_to_secure(&mut self) -> mailwire_smtp::Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

fn connected(sink: &Sink) -> Connection {
    let mut conn = Connection::new(Arc::new(NoopListener));
    conn.open(&Config::new("mx.example.com"), |_, _| {}, |_, _| {});
    conn.handle_connected(Box::new(sink.clone()));
    conn.handle_input(b"220 ready\r\n");
    conn
}

fn capture_debug<F: FnOnce()>(f: F) -> String {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    capture.contents()
}

#[test]
fn test_masked_command_is_not_logged_in_clear() {
    let sink = Sink::default();
    let logs = capture_debug(|| {
        let mut conn = connected(&sink);
        conn.write("AUTH PLAIN dXNlcgBwYXNz", Some(11), |_, _| {});
    });

    assert!(logs.contains("command: AUTH PLAIN ************"), "{logs}");
    assert!(!logs.contains("dXNlcgBwYXNz"));
    // the wire still carries the real text
    let sent = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert_eq!(sent, "AUTH PLAIN dXNlcgBwYXNz\r\n");
}

#[test]
fn test_long_command_is_truncated_in_log() {
    let sink = Sink::default();
    let body = "x".repeat(1500);
    let logs = capture_debug(|| {
        let mut conn = connected(&sink);
        conn.write(&format!("XTEST {body}"), None, |_, _| {});
    });

    assert!(logs.contains("..."));
    assert!(!logs.contains(&body));
    assert_eq!(sink.0.lock().unwrap().len(), 6 + 1500 + 2);
}

#[test]
fn test_commands_not_rendered_without_debug() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    let sink = Sink::default();
    tracing::subscriber::with_default(subscriber, || {
        let mut conn = connected(&sink);
        conn.write("AUTH PLAIN c2VjcmV0", Some(11), |_, _| {});
    });
    assert!(!capture.contents().contains("AUTH"));
}
