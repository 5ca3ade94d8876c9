//! Lifecycle notifications from a connection to its pool.

use crate::connection::{Connection, ConnectionId};

/// Receives lifecycle events from connections.
///
/// Implemented by the pool. All methods are called on the connection's own
/// task, while the connection is borrowed, so implementations must not block.
pub trait LifecycleListener: Send + Sync {
    /// A connect attempt failed before a live connection existed.
    ///
    /// Pools that count a connection when the attempt starts decrement here;
    /// [`connection_closed`](Self::connection_closed) is never called for the
    /// same attempt.
    fn connect_failed(&self, id: ConnectionId);

    /// The socket of a live connection has closed.
    fn connection_closed(&self, conn: &Connection);

    /// The current operation on `conn` has ended. The connection is reusable
    /// unless [`Connection::is_broken`] says otherwise.
    fn operation_ended(&self, conn: &Connection);
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl LifecycleListener for NoopListener {
    fn connect_failed(&self, _id: ConnectionId) {}

    fn connection_closed(&self, _conn: &Connection) {}

    fn operation_ended(&self, _conn: &Connection) {}
}
