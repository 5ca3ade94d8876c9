//! The SMTP connection state machine.
//!
//! A [`Connection`] owns one socket (through a [`Transport`]), correlates
//! outgoing command lines with incoming reply blocks and tracks whether the
//! socket is usable. It performs no I/O and never blocks: the task that owns
//! the socket feeds it events through the `handle_*` methods, and everything
//! the connection wants done is either queued on the transport or delivered
//! to a callback.
//!
//! ## States
//!
//! ```text
//!            open             connected          set_idle
//! Closed ───────────→ Connecting ─────→ Active ←──────────→ Idle
//!                         │               │    use_connection  │
//!                  failed │      close /  │                    │ close
//!                         ▼     shutdown  ▼                    ▼
//!                       Broken ←──── ShuttingDown ──QUIT──→ Closed
//!                         ▲   fault / peer close
//!                         └──────────────────────── (any live state)
//! ```
//!
//! ## Threading
//!
//! The connection holds no lock. Every call must be made from the task that
//! owns it (its *execution context*); the [`driver`](crate::driver) gives
//! other tasks a [`ConnectionHandle`](crate::ConnectionHandle) that schedules
//! closures onto that task.
//!
//! ## Reply correlation
//!
//! There is exactly one reply slot. A new [`write`](Connection::write)
//! replaces any handler that has not fired yet, and the replaced handler is
//! never called. Callers serialize their writes.

mod state;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{Level, debug, error, info, trace};

pub use state::ConnectionState;
use state::{Live, Phase};

use crate::assembler::ReplyAssembler;
use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::listener::LifecycleListener;
use crate::logging::redact_command;
use crate::quit;
use crate::transport::Transport;
use crate::types::Reply;

/// Handler for errors raised while an operation is in flight.
pub type ErrorHandler = Arc<dyn Fn(&mut Connection, Error) + Send + Sync>;

/// Handler for one assembled reply batch.
pub(crate) type ReplyHandler = Box<dyn FnOnce(&mut Connection, Vec<Reply>) + Send>;

/// Work scheduled on the connection's own task.
pub type Task = Box<dyn FnOnce(&mut Connection) + Send>;

type CompletionHandler = Box<dyn FnOnce(&mut Connection, Result<()>) + Send>;

/// Identifier of the task a connection is bound to.
pub type ContextId = tokio::task::Id;

/// Default time the QUIT step waits for its reply.
const DEFAULT_QUIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Timer {
    deadline: Instant,
    on_expiry: Task,
}

/// One pooled SMTP connection.
pub struct Connection {
    id: ConnectionId,
    address: String,
    quit_timeout: Duration,
    phase: Phase,
    /// The peer closed the socket.
    socket_closed: bool,
    /// Close via QUIT the next time the connection would be recycled.
    pending_shutdown: bool,
    assembler: ReplyAssembler,
    capabilities: Capabilities,
    error_handler: Option<ErrorHandler>,
    base_error_handler: Option<ErrorHandler>,
    listener: Arc<dyn LifecycleListener>,
    context: Option<ContextId>,
    drain_waiters: VecDeque<Task>,
    upgrade_handler: Option<CompletionHandler>,
    timer: Option<Timer>,
    scheduled: VecDeque<Task>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("socket_closed", &self.socket_closed)
            .field("pending_shutdown", &self.pending_shutdown)
            .field("pending_reply", &self.has_pending_reply())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates an unopened connection reporting to `listener`.
    #[must_use]
    pub fn new(listener: Arc<dyn LifecycleListener>) -> Self {
        Self {
            id: ConnectionId::next(),
            address: String::new(),
            quit_timeout: DEFAULT_QUIT_TIMEOUT,
            phase: Phase::Closed,
            socket_closed: false,
            pending_shutdown: false,
            assembler: ReplyAssembler::new(),
            capabilities: Capabilities::default(),
            error_handler: None,
            base_error_handler: None,
            listener,
            context: None,
            drain_waiters: VecDeque::new(),
            upgrade_handler: None,
            timer: None,
            scheduled: VecDeque::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Opening and transport events
    // ---------------------------------------------------------------------

    /// Starts opening the connection.
    ///
    /// The socket task connects to `config.host:config.port` and reports back
    /// with [`handle_connected`](Self::handle_connected) or
    /// [`handle_connect_failed`](Self::handle_connect_failed). The server's
    /// greeting is delivered to `on_greeting` as the first reply; connect and
    /// I/O failures go to `on_error`.
    pub fn open<G, E>(&mut self, config: &Config, on_greeting: G, on_error: E)
    where
        G: FnOnce(&mut Self, Reply) + Send + 'static,
        E: Fn(&mut Self, Error) + Send + Sync + 'static,
    {
        self.address = config.address();
        self.quit_timeout = config.quit_timeout;
        self.error_handler = Some(Arc::new(on_error));
        self.socket_closed = false;
        self.phase = Phase::Connecting {
            on_greeting: Some(single_reply(on_greeting)),
        };
        debug!(conn = %self.id, address = %self.address, "opening connection");
    }

    /// The socket is connected. Binds the connection to the calling task and
    /// arms the greeting handler.
    pub fn handle_connected(&mut self, mut transport: Box<dyn Transport>) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Connecting { on_greeting } => {
                self.context = tokio::task::try_id();
                self.socket_closed = false;
                self.assembler.reset();
                self.assembler.set_expected(1);
                self.phase = Phase::Active(Live {
                    transport,
                    pending: on_greeting,
                });
                debug!(conn = %self.id, address = %self.address, "connected");
            }
            other => {
                debug!(
                    conn = %self.id,
                    state = %other.tag(),
                    "connect completed after close, dropping socket"
                );
                transport.close();
                self.phase = other;
            }
        }
    }

    /// The connect attempt failed. No live connection was produced.
    pub fn handle_connect_failed(&mut self, err: Error) {
        error!(conn = %self.id, address = %self.address, %err, "exception on connect");
        if matches!(self.phase, Phase::Connecting { .. }) {
            self.phase = Phase::Broken;
        }
        let listener = Arc::clone(&self.listener);
        listener.connect_failed(self.id);
        self.deliver_error(err);
    }

    /// Data arrived from the socket.
    ///
    /// Every completed reply batch goes to the handler in the reply slot,
    /// which is emptied before the handler runs. Batches arriving with an
    /// empty slot are dropped.
    pub fn handle_input(&mut self, data: &[u8]) {
        if self.phase.live().is_none() {
            trace!(conn = %self.id, len = data.len(), "dropping data on a closed connection");
            return;
        }
        self.assembler.feed(data);
        while let Some(batch) = self.assembler.poll_batch() {
            match batch {
                Ok(replies) => self.dispatch(replies),
                Err(err) => {
                    self.handle_exception(err);
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, replies: Vec<Reply>) {
        let handler = self.phase.live_mut().and_then(|live| live.pending.take());
        match handler {
            Some(handler) => handler(self, replies),
            None => debug!(conn = %self.id, "dropping reply arriving after we stopped processing"),
        }
    }

    /// The socket reported an error.
    ///
    /// Delivered once, and only while an operation may be in flight: errors
    /// on an idle, broken, closed or shut-down connection are only logged.
    pub fn handle_exception(&mut self, err: Error) {
        let state = self.state();
        let in_flight = matches!(state, ConnectionState::Active | ConnectionState::ShuttingDown);
        if self.socket_closed || !in_flight {
            debug!(conn = %self.id, %state, %err, "not returning follow-up exception");
            return;
        }
        self.set_broken();
        debug!(conn = %self.id, %err, "got an exception on the socket");
        self.deliver_error(err);
    }

    /// The socket closed.
    ///
    /// The listener always hears about it. A close during an operation is an
    /// error; a close while idle (server timeout) only retires the
    /// connection; a close we caused is expected.
    pub fn handle_closed(&mut self) {
        debug!(conn = %self.id, "socket has been closed");
        let listener = Arc::clone(&self.listener);
        listener.connection_closed(self);
        self.socket_closed = true;

        match self.state() {
            ConnectionState::Active | ConnectionState::ShuttingDown => {
                self.set_broken();
                debug!(conn = %self.id, "connection has been closed by the server");
                self.deliver_error(Error::ClosedByServer);
            }
            ConnectionState::Idle => {
                debug!(
                    conn = %self.id,
                    "closed while connection has been idle (timeout on server?)"
                );
                self.set_broken();
            }
            ConnectionState::Broken | ConnectionState::Closed | ConnectionState::Connecting => {
                debug!(conn = %self.id, "close has been expected");
            }
        }
    }

    /// The transport's outbound queue has room again. Every write deferred by
    /// [`write_line_with_backpressure`](Self::write_line_with_backpressure)
    /// runs, in order; the waiters are removed before the first one runs.
    pub fn handle_drain(&mut self) {
        let waiters = std::mem::take(&mut self.drain_waiters);
        trace!(conn = %self.id, waiting = waiters.len(), "drain");
        for waiter in waiters {
            waiter(self);
        }
    }

    /// A TLS upgrade started by [`upgrade_to_secure`](Self::upgrade_to_secure)
    /// finished.
    pub fn handle_upgraded(&mut self, result: Result<()>) {
        if result.is_ok() {
            // nothing read before the handshake may be trusted
            self.assembler.reset();
        }
        match self.upgrade_handler.take() {
            Some(handler) => handler(self, result),
            None => debug!(conn = %self.id, "upgrade completed with no one waiting"),
        }
    }

    /// Returns when [`handle_timeout`](Self::handle_timeout) should next be
    /// called.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.timer.as_ref().map(|timer| timer.deadline)
    }

    /// Fires the armed timer if its deadline has passed.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.timer.as_ref().is_some_and(|timer| timer.deadline <= now)
            && let Some(timer) = self.timer.take()
        {
            (timer.on_expiry)(self);
        }
    }

    pub(crate) fn arm_timer<F>(&mut self, deadline: Instant, on_expiry: F)
    where
        F: FnOnce(&mut Self) + Send + 'static,
    {
        self.timer = Some(Timer {
            deadline,
            on_expiry: Box::new(on_expiry),
        });
    }

    pub(crate) fn disarm_timer(&mut self) {
        self.timer = None;
    }

    // ---------------------------------------------------------------------
    // Writing
    // ---------------------------------------------------------------------

    /// Sends a command line and registers `on_reply` for its reply.
    ///
    /// `text` is sent followed by CRLF. Characters from `mask_from` on are
    /// masked in the debug log. The handler replaces any handler still
    /// waiting. Writing after the peer closed the socket fails with
    /// [`Error::ClosedByServer`]; writing without a socket fails with
    /// [`Error::NotConnected`]; both go to the active error handler.
    pub fn write<F>(&mut self, text: &str, mask_from: Option<usize>, on_reply: F)
    where
        F: FnOnce(&mut Self, Reply) + Send + 'static,
    {
        self.write_with(text, mask_from, single_reply(on_reply));
    }

    /// Sends several command lines in one write (pipelining) and waits for
    /// one reply block per line.
    ///
    /// `on_replies` runs once with every block, in order. The assembler goes
    /// back to expecting a single block before it runs.
    pub fn write_commands<S, F>(&mut self, commands: &[S], on_replies: F)
    where
        S: AsRef<str>,
        F: FnOnce(&mut Self, Vec<Reply>) + Send + 'static,
    {
        if commands.is_empty() {
            self.deliver_error(Error::InvalidState("no commands to write".into()));
            return;
        }
        let joined = commands
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\r\n");

        self.assembler.set_expected(commands.len());
        let sent = self.write_with(
            &joined,
            None,
            Box::new(move |conn: &mut Self, replies: Vec<Reply>| {
                conn.assembler.set_expected(1);
                on_replies(conn, replies);
            }),
        );
        if !sent {
            self.assembler.set_expected(1);
        }
    }

    fn write_with(&mut self, text: &str, mask_from: Option<usize>, handler: ReplyHandler) -> bool {
        if self.socket_closed {
            debug!(conn = %self.id, "connection was closed by server");
            self.deliver_error(Error::ClosedByServer);
            return false;
        }
        let id = self.id;
        let Some(live) = self.phase.live_mut() else {
            debug!(conn = %id, "not sending command since the socket is gone");
            self.deliver_error(Error::NotConnected);
            return false;
        };

        live.pending = Some(handler);
        if tracing::enabled!(Level::DEBUG) {
            let logged = redact_command(text, mask_from);
            debug!(conn = %id, "command: {logged}");
        }
        if let Err(err) = live.transport.write(line_bytes(text)) {
            self.handle_exception(err);
            return false;
        }
        true
    }

    /// Sends a line that expects no reply (message content).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedByServer`] after the peer closed the socket,
    /// and an error if there is no socket or the transport refuses the write.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        if self.socket_closed {
            return Err(Error::ClosedByServer);
        }
        let id = self.id;
        let live = self.phase.live_mut().ok_or(Error::NotConnected)?;
        trace!(conn = %id, "{text}");
        live.transport.write(line_bytes(text))
    }

    /// Sends a line that expects no reply, holding it back while the
    /// transport's outbound queue is full.
    ///
    /// `on_complete` runs once the line was handed to the transport (or
    /// refused). Lines deferred earlier are sent first.
    pub fn write_line_with_backpressure<F>(&mut self, text: &str, on_complete: F)
    where
        F: FnOnce(&mut Self, Result<()>) + Send + 'static,
    {
        if self.socket_closed {
            on_complete(self, Err(Error::ClosedByServer));
            return;
        }
        let deferred = !self.drain_waiters.is_empty();
        let Some(live) = self.phase.live_mut() else {
            on_complete(self, Err(Error::NotConnected));
            return;
        };

        if deferred || live.transport.is_write_queue_full() {
            trace!(conn = %self.id, "write queue full, waiting for drain");
            let line = text.to_string();
            self.drain_waiters.push_back(Box::new(move |conn: &mut Self| {
                let result = conn.write_line(&line);
                on_complete(conn, result);
            }));
        } else {
            trace!(conn = %self.id, "{text}");
            let result = live.transport.write(line_bytes(text));
            on_complete(self, result);
        }
    }

    /// Starts a TLS upgrade of the socket; `on_complete` receives the
    /// outcome unchanged.
    pub fn upgrade_to_secure<F>(&mut self, on_complete: F)
    where
        F: FnOnce(&mut Self, Result<()>) + Send + 'static,
    {
        let Some(live) = self.phase.live_mut() else {
            on_complete(self, Err(Error::NotConnected));
            return;
        };
        match live.transport.upgrade_to_secure() {
            Ok(()) => self.upgrade_handler = Some(Box::new(on_complete)),
            Err(err) => on_complete(self, Err(err)),
        }
    }

    /// Replaces the capability table with one parsed from an EHLO reply.
    pub fn parse_capabilities(&mut self, ehlo: &Reply) {
        self.capabilities = Capabilities::from_reply(ehlo);
        debug!(conn = %self.id, count = self.capabilities.extensions.len(), "parsed capabilities");
    }

    // ---------------------------------------------------------------------
    // Pool-facing lifecycle
    // ---------------------------------------------------------------------

    /// Parks the connection in the pool. Ignored unless it is active.
    pub fn set_idle(&mut self) {
        self.relabel_live(ConnectionState::Active, Phase::Idle);
    }

    /// Takes the connection out of the pool. Ignored unless it is idle.
    pub fn use_connection(&mut self) {
        self.relabel_live(ConnectionState::Idle, Phase::Active);
    }

    fn relabel_live(&mut self, from: ConnectionState, to: fn(Live) -> Phase) {
        let state = self.state();
        if state == from {
            let phase = std::mem::replace(&mut self.phase, Phase::Closed);
            self.phase = phase.relabel(to);
        } else {
            debug!(conn = %self.id, %state, "ignoring state change from {from}");
        }
    }

    /// Ends the current operation.
    ///
    /// If a shutdown was requested this closes the connection with QUIT.
    /// Otherwise the reply slot is cleared, the listener learns the operation
    /// ended, and the active error handler is dropped. Marking the connection
    /// idle is a separate call. Returning an idle connection is a logic error
    /// reported through the active error handler.
    pub fn return_to_pool(&mut self) {
        if self.is_idle() {
            info!(conn = %self.id, "state error: idle connection returned to pool");
            self.deliver_error(Error::InvalidState("idle connection returned to pool".into()));
            return;
        }
        if self.pending_shutdown {
            debug!(conn = %self.id, "shutting connection down");
            self.quit_close_connection();
            return;
        }

        debug!(conn = %self.id, "returning connection to pool");
        if let Some(live) = self.phase.live_mut() {
            live.pending = None;
        }
        self.notify_operation_ended();
        self.error_handler = None;
    }

    /// Asks for the connection to be closed the next time it is returned to
    /// the pool. An operation in flight is not interrupted.
    pub fn request_shutdown(&mut self) {
        debug!(conn = %self.id, "will shut down connection after the current operation finishes");
        self.pending_shutdown = true;
    }

    /// Marks the connection unusable and releases the socket. Calling it
    /// again has no effect.
    pub fn set_broken(&mut self) {
        if self.state().is_terminal() {
            debug!(conn = %self.id, "connection is already set to broken");
            return;
        }
        debug!(conn = %self.id, "setting connection to broken");
        let phase = std::mem::replace(&mut self.phase, Phase::Broken);
        self.release(phase);
        self.notify_operation_ended();
    }

    /// Closes the connection with QUIT, whatever its state.
    pub fn close(&mut self) {
        self.quit_close_connection();
    }

    /// Sends QUIT on the connection's own task, then releases the socket
    /// whatever the outcome.
    fn quit_close_connection(&mut self) {
        if self.state().is_terminal() {
            debug!(conn = %self.id, "connection is already shut down");
            return;
        }
        self.run_on_context(|conn| {
            let state = conn.state();
            if state.is_terminal() {
                debug!(conn = %conn.id, "connection shut down before QUIT could be sent");
                return;
            }
            debug!(conn = %conn.id, "shutting down connection");
            if conn.socket_closed || !state.is_live() {
                debug!(conn = %conn.id, "connection is already closed, only doing shutdown");
                conn.shutdown();
            } else {
                // keeps the pool from handing it out while QUIT runs
                let phase = std::mem::replace(&mut conn.phase, Phase::Closed);
                conn.phase = phase.relabel(Phase::ShuttingDown);
                quit::start(conn);
            }
        });
    }

    /// Releases the socket after a close we initiated.
    pub(crate) fn shutdown(&mut self) {
        let next = if matches!(self.phase, Phase::Broken) {
            Phase::Broken
        } else {
            Phase::Closed
        };
        let phase = std::mem::replace(&mut self.phase, next);
        self.release(phase);
    }

    fn release(&mut self, phase: Phase) {
        if let Some(mut live) = phase.into_live() {
            debug!(conn = %self.id, "closing socket");
            live.transport.close();
        }
        self.drain_waiters.clear();
        self.upgrade_handler = None;
        self.timer = None;
    }

    fn notify_operation_ended(&self) {
        let listener = Arc::clone(&self.listener);
        listener.operation_ended(self);
    }

    // ---------------------------------------------------------------------
    // Error handlers
    // ---------------------------------------------------------------------

    /// Installs a local error handler.
    ///
    /// The handler active before the *first* override is remembered;
    /// later overrides replace the active handler without being remembered,
    /// so [`reset_error_handler`](Self::reset_error_handler) returns to that
    /// first one.
    pub fn set_error_handler<E>(&mut self, handler: E)
    where
        E: Fn(&mut Self, Error) + Send + Sync + 'static,
    {
        if self.base_error_handler.is_none() {
            self.base_error_handler = self.error_handler.clone();
        }
        self.error_handler = Some(Arc::new(handler));
    }

    /// Restores the remembered error handler.
    pub fn reset_error_handler(&mut self) {
        self.error_handler = self.base_error_handler.clone();
    }

    fn deliver_error(&mut self, err: Error) {
        match self.error_handler.clone() {
            Some(handler) => handler(self, err),
            None => debug!(conn = %self.id, %err, "no error handler installed, dropping error"),
        }
    }

    // ---------------------------------------------------------------------
    // Execution context
    // ---------------------------------------------------------------------

    /// Defers `task` until the current event has been handled, on this
    /// connection's task.
    pub fn run_on_context<F>(&mut self, task: F)
    where
        F: FnOnce(&mut Self) + Send + 'static,
    {
        self.scheduled.push_back(Box::new(task));
    }

    /// Runs deferred tasks, including any they defer in turn.
    pub fn run_scheduled(&mut self) {
        debug_assert!(self.is_on_context(), "connection used off its own task");
        while let Some(task) = self.scheduled.pop_front() {
            task(self);
        }
    }

    /// Returns true if deferred tasks are waiting.
    #[must_use]
    pub fn has_scheduled(&self) -> bool {
        !self.scheduled.is_empty()
    }

    /// Returns the task this connection is bound to, once connected.
    #[must_use]
    pub const fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Returns true if called from the connection's task, or if it is not
    /// bound to one yet.
    #[must_use]
    pub fn is_on_context(&self) -> bool {
        self.context.is_none() || tokio::task::try_id() == self.context
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `host:port` of the server.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.phase.tag()
    }

    /// Returns true if the connection is unusable (broken, closed, or never
    /// opened).
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns true while parked in the pool.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle(_))
    }

    /// Returns true once the peer has closed the socket.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.socket_closed
    }

    /// Returns true if a shutdown was requested.
    #[must_use]
    pub const fn is_shutdown_requested(&self) -> bool {
        self.pending_shutdown
    }

    /// Returns true if a reply handler is waiting.
    #[must_use]
    pub fn has_pending_reply(&self) -> bool {
        match &self.phase {
            Phase::Connecting { on_greeting } => on_greeting.is_some(),
            phase => phase.live().is_some_and(|live| live.pending.is_some()),
        }
    }

    /// Returns true if the socket is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.phase
            .live()
            .is_some_and(|live| live.transport.is_secure())
    }

    /// Returns the latest capability table.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns how long the QUIT step waits for its reply.
    #[must_use]
    pub const fn quit_timeout(&self) -> Duration {
        self.quit_timeout
    }
}

fn single_reply<F>(on_reply: F) -> ReplyHandler
where
    F: FnOnce(&mut Connection, Reply) + Send + 'static,
{
    Box::new(move |conn: &mut Connection, replies: Vec<Reply>| match replies.into_iter().next() {
        Some(reply) => on_reply(conn, reply),
        None => debug!(conn = %conn.id, "empty reply batch"),
    })
}

fn line_bytes(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 2);
    buf.put_slice(text.as_bytes());
    buf.put_slice(b"\r\n");
    buf.freeze()
}
