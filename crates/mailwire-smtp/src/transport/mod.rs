//! Transport seam between the connection state machine and the socket.
//!
//! The [`Connection`](crate::Connection) never touches a socket directly. It
//! talks to a [`Transport`], which only *queues* work; the task that owns the
//! socket performs it and reports back through the connection's `handle_*`
//! methods (data, close, exception, drain, upgrade completion).

mod stream;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

pub use stream::{NetStream, connect, connect_tls, open};

/// Operations a connection can ask of its socket.
pub trait Transport: Send {
    /// Queues bytes for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is already closed.
    fn write(&mut self, data: Bytes) -> Result<()>;

    /// Returns true if the outbound queue is above its high-water mark.
    /// A drain notification follows once it has emptied enough.
    fn is_write_queue_full(&self) -> bool;

    /// Returns true if the channel is encrypted.
    fn is_secure(&self) -> bool;

    /// Starts a TLS upgrade. Completion is reported separately.
    ///
    /// # Errors
    ///
    /// Returns an error if the upgrade cannot be started.
    fn upgrade_to_secure(&mut self) -> Result<()>;

    /// Closes the socket. A close event follows.
    fn close(&mut self);
}

/// Work queued by a [`ChannelTransport`] for the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    /// Send these bytes.
    Write(Bytes),
    /// Perform a TLS handshake on the current socket.
    UpgradeToSecure,
    /// Shut the socket down.
    Close,
}

/// State shared between a [`ChannelTransport`] and the socket task.
#[derive(Debug, Default)]
pub struct TransportShared {
    queued: AtomicUsize,
    secure: AtomicBool,
    reported_full: AtomicBool,
}

impl TransportShared {
    /// Creates shared state for a socket that starts plain or encrypted.
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            queued: AtomicUsize::new(0),
            secure: AtomicBool::new(secure),
            reported_full: AtomicBool::new(false),
        }
    }

    /// Records that `len` queued bytes reached the socket. Returns true when a
    /// drain should be signalled: the queue had been reported full and has
    /// now fallen to `low_water` or below.
    pub fn written(&self, len: usize, low_water: usize) -> bool {
        let before = self.queued.fetch_sub(len, Ordering::AcqRel);
        let left = before.saturating_sub(len);
        left <= low_water && self.reported_full.swap(false, Ordering::AcqRel)
    }

    /// Marks the socket as encrypted.
    pub fn set_secure(&self) {
        self.secure.store(true, Ordering::Release);
    }

    /// Returns the number of queued, unsent bytes.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}

/// [`Transport`] that forwards operations to the socket task over a channel.
#[derive(Debug)]
pub struct ChannelTransport {
    ops: mpsc::UnboundedSender<TransportOp>,
    shared: Arc<TransportShared>,
    limit: usize,
    closed: bool,
}

impl ChannelTransport {
    /// Creates a transport and the receiving end the socket task reads from.
    #[must_use]
    pub fn new(
        shared: Arc<TransportShared>,
        limit: usize,
    ) -> (Self, mpsc::UnboundedReceiver<TransportOp>) {
        let (ops, rx) = mpsc::unbounded_channel();
        let transport = Self {
            ops,
            shared,
            limit,
            closed: false,
        };
        (transport, rx)
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, data: Bytes) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        let len = data.len();
        self.shared.queued.fetch_add(len, Ordering::AcqRel);
        self.ops.send(TransportOp::Write(data)).map_err(|_| {
            self.shared.queued.fetch_sub(len, Ordering::AcqRel);
            Error::NotConnected
        })
    }

    fn is_write_queue_full(&self) -> bool {
        let queued = self.shared.queued();
        // an empty queue is never full, or no write would be left to drain it
        let full = queued > 0 && queued >= self.limit;
        if full {
            self.shared.reported_full.store(true, Ordering::Release);
        }
        full
    }

    fn is_secure(&self) -> bool {
        self.shared.secure.load(Ordering::Acquire)
    }

    fn upgrade_to_secure(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        if self.is_secure() {
            return Err(Error::Protocol("Already using TLS".into()));
        }
        self.ops
            .send(TransportOp::UpgradeToSecure)
            .map_err(|_| Error::NotConnected)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            // the socket task may already be gone; nothing left to close then
            let _ = self.ops.send(TransportOp::Close);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn transport(limit: usize) -> (ChannelTransport, mpsc::UnboundedReceiver<TransportOp>) {
        ChannelTransport::new(Arc::new(TransportShared::new(false)), limit)
    }

    #[test]
    fn writes_are_queued_in_order() {
        let (mut t, mut rx) = transport(1024);
        t.write(Bytes::from_static(b"EHLO a\r\n")).unwrap();
        t.write(Bytes::from_static(b"QUIT\r\n")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), TransportOp::Write(Bytes::from_static(b"EHLO a\r\n")));
        assert_eq!(rx.try_recv().unwrap(), TransportOp::Write(Bytes::from_static(b"QUIT\r\n")));
        assert_eq!(t.shared.queued(), 14);
    }

    #[test]
    fn full_queue_drains_once() {
        let (mut t, _rx) = transport(8);
        t.write(Bytes::from_static(b"0123456789")).unwrap();
        assert!(t.is_write_queue_full());
        assert!(t.shared.written(10, 4));
        t.write(Bytes::from_static(b"01")).unwrap();
        assert!(!t.shared.written(2, 4));
    }

    #[test]
    fn zero_limit_is_full_only_with_bytes_queued() {
        let (mut t, _rx) = transport(0);
        assert!(!t.is_write_queue_full());
        t.write(Bytes::from_static(b"Subject: x\r\n")).unwrap();
        assert!(t.is_write_queue_full());
        assert!(t.shared.written(12, 0));
        assert!(!t.is_write_queue_full());
    }

    #[test]
    fn no_drain_without_full_report() {
        let (mut t, _rx) = transport(8);
        t.write(Bytes::from_static(b"0123456789")).unwrap();
        assert!(!t.shared.written(10, 4));
    }

    #[test]
    fn close_is_sent_once_and_blocks_writes() {
        let (mut t, mut rx) = transport(8);
        t.close();
        t.close();
        assert_eq!(rx.try_recv().unwrap(), TransportOp::Close);
        assert!(rx.try_recv().is_err());
        assert!(t.write(Bytes::from_static(b"x")).is_err());
        assert!(t.upgrade_to_secure().is_err());
    }

    #[test]
    fn upgrade_refused_when_already_secure() {
        let (mut t, _rx) = ChannelTransport::new(Arc::new(TransportShared::new(true)), 8);
        assert!(t.is_secure());
        assert!(matches!(t.upgrade_to_secure(), Err(Error::Protocol(_))));
    }
}
