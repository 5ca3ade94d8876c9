//! Socket task driving one [`Connection`].
//!
//! [`spawn`] starts a tokio task that owns both the socket and the connection
//! state machine. That task is the connection's execution context: every
//! event (bytes read, write completions, timer expiry, scheduled closures)
//! is handled on it, one at a time, so the state machine needs no locks.
//!
//! Other tasks reach the connection through a [`ConnectionHandle`]. Dropping
//! every handle closes the connection gracefully with QUIT.

use std::future::{self, Future};
use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::config::Config;
use crate::connection::{Connection, ConnectionId, Task};
use crate::error::{Error, Result};
use crate::listener::LifecycleListener;
use crate::transport::{self, ChannelTransport, NetStream, TransportOp, TransportShared};
use crate::types::Reply;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Cloneable handle that runs closures on a connection's own task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tasks: mpsc::UnboundedSender<Task>,
}

impl ConnectionHandle {
    /// Returns the identifier of the connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Schedules `f` on the connection's task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the task has ended.
    pub fn run<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Connection) + Send + 'static,
    {
        self.tasks
            .send(Box::new(f))
            .map_err(|_| Error::NotConnected)
    }

    /// Runs `f` on the connection's task and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the task ended before `f` ran.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.run(move |conn| {
            // the caller may have stopped waiting
            let _ = tx.send(f(conn));
        })?;
        rx.await.map_err(|_| Error::NotConnected)
    }

    /// Returns true once the connection's task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.is_closed()
    }

    /// Waits until the connection's task has ended.
    pub async fn finished(&self) {
        self.tasks.closed().await;
    }
}

/// Opens a connection on a new task.
///
/// Connecting happens in the background: the greeting arrives at
/// `on_greeting`, and a failed connect goes to `on_error` after
/// [`LifecycleListener::connect_failed`]. Must be called from within a tokio
/// runtime.
pub fn spawn<G, E>(
    config: Config,
    listener: Arc<dyn LifecycleListener>,
    on_greeting: G,
    on_error: E,
) -> ConnectionHandle
where
    G: FnOnce(&mut Connection, Reply) + Send + 'static,
    E: Fn(&mut Connection, Error) + Send + Sync + 'static,
{
    let mut conn = Connection::new(listener);
    conn.open(&config, on_greeting, on_error);

    let (tasks, task_rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle {
        id: conn.id(),
        tasks,
    };
    tokio::spawn(drive(conn, config, task_rx));
    handle
}

/// A socket the driver can run a connection over.
trait Socket: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    fn is_secure(&self) -> bool;

    /// Performs a TLS handshake over the socket.
    fn upgrade(self, hostname: &str) -> impl Future<Output = Result<Self>> + Send;
}

impl Socket for NetStream {
    fn is_secure(&self) -> bool {
        Self::is_secure(self)
    }

    fn upgrade(self, hostname: &str) -> impl Future<Output = Result<Self>> + Send {
        self.upgrade_to_tls(hostname)
    }
}

enum Event {
    Op(Option<TransportOp>),
    Task(Option<Task>),
    Read(io::Result<usize>),
    Timer,
}

async fn drive(mut conn: Connection, config: Config, mut tasks: mpsc::UnboundedReceiver<Task>) {
    match transport::open(&config).await {
        Ok(stream) => run_socket(&mut conn, stream, &config, &mut tasks).await,
        Err(err) => {
            conn.handle_connect_failed(err);
            conn.run_scheduled();
        }
    }
    debug!(conn = %conn.id(), state = %conn.state(), "connection task finished");
}

/// Binds `conn` to a connected socket and routes events until the socket
/// closes.
async fn run_socket<S: Socket>(
    conn: &mut Connection,
    mut stream: S,
    config: &Config,
    tasks: &mut mpsc::UnboundedReceiver<Task>,
) {
    let limit = config.write_queue_limit;
    let shared = Arc::new(TransportShared::new(stream.is_secure()));
    let (channel, mut ops) = ChannelTransport::new(Arc::clone(&shared), limit);
    conn.handle_connected(Box::new(channel));
    conn.run_scheduled();

    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut handles_open = true;

    loop {
        let deadline = conn.poll_timeout();
        let event = tokio::select! {
            biased;
            op = ops.recv() => Event::Op(op),
            task = tasks.recv(), if handles_open => Event::Task(task),
            read = stream.read_buf(&mut buf) => Event::Read(read),
            () = sleep_until(deadline) => Event::Timer,
        };

        match event {
            Event::Op(Some(TransportOp::Write(data))) => {
                let len = data.len();
                let written = write_all(&mut stream, &data).await;
                let drained = shared.written(len, limit / 2);
                match written {
                    Ok(()) if drained => conn.handle_drain(),
                    Ok(()) => {}
                    Err(err) => conn.handle_exception(err.into()),
                }
            }
            Event::Op(Some(TransportOp::UpgradeToSecure)) => {
                match stream.upgrade(&config.host).await {
                    Ok(secure) => {
                        stream = secure;
                        shared.set_secure();
                        debug!(conn = %conn.id(), "upgraded to TLS");
                        conn.handle_upgraded(Ok(()));
                    }
                    Err(err) => {
                        // the plain socket was consumed by the failed handshake
                        debug!(conn = %conn.id(), %err, "TLS upgrade failed");
                        conn.handle_upgraded(Err(err));
                        conn.set_broken();
                        conn.handle_closed();
                        conn.run_scheduled();
                        break;
                    }
                }
            }
            Event::Op(Some(TransportOp::Close) | None) => {
                if let Err(err) = stream.shutdown().await {
                    trace!(conn = %conn.id(), %err, "socket shutdown failed");
                }
                conn.handle_closed();
                conn.run_scheduled();
                break;
            }
            Event::Task(Some(task)) => task(&mut *conn),
            Event::Task(None) => {
                debug!(conn = %conn.id(), "all handles dropped, closing");
                handles_open = false;
                conn.close();
            }
            Event::Read(Ok(0)) => {
                conn.handle_closed();
                conn.run_scheduled();
                break;
            }
            Event::Read(Ok(_)) => {
                conn.handle_input(&buf);
                buf.clear();
            }
            Event::Read(Err(err)) => {
                // a failed read leaves the socket unusable
                conn.handle_exception(err.into());
                conn.handle_closed();
                conn.run_scheduled();
                break;
            }
            Event::Timer => conn.handle_timeout(Instant::now()),
        }
        conn.run_scheduled();
    }
}

async fn write_all<S: AsyncWrite + Unpin>(stream: &mut S, data: &[u8]) -> io::Result<()> {
    stream.write_all(data).await?;
    stream.flush().await
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::listener::NoopListener;

    impl Socket for Mock {
        fn is_secure(&self) -> bool {
            false
        }

        async fn upgrade(self, _hostname: &str) -> Result<Self> {
            Err(Error::Protocol("no TLS on a scripted socket".into()))
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn opened<G>(errors: &Log, on_greeting: G) -> Connection
    where
        G: FnOnce(&mut Connection, Reply) + Send + 'static,
    {
        let errors = errors.clone();
        let mut conn = Connection::new(Arc::new(NoopListener));
        conn.open(&Config::new("mx.example.com"), on_greeting, move |_, err| {
            errors.lock().unwrap().push(err.to_string());
        });
        conn
    }

    #[tokio::test]
    async fn test_ehlo_then_quit_over_scripted_socket() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-mx.example.com\r\n250 PIPELINING\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let errors = Log::default();
        let mut conn = opened(&errors, |conn, _greeting| {
            conn.write("EHLO client.example.com", None, |conn, reply| {
                conn.parse_capabilities(&reply);
                conn.close();
            });
        });
        let config = Config::new("mx.example.com");
        let (_tasks_tx, mut tasks) = mpsc::unbounded_channel();

        run_socket(&mut conn, mock, &config, &mut tasks).await;

        assert_eq!(conn.state(), crate::ConnectionState::Closed);
        assert!(conn.capabilities().supports_pipelining());
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_handles_send_quit() {
        let mock = Builder::new()
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let errors = Log::default();
        let mut conn = opened(&errors, |_, _| panic!("no greeting expected"));
        let config = Config::new("mx.example.com");
        let (tasks_tx, mut tasks) = mpsc::unbounded_channel::<Task>();
        drop(tasks_tx);

        run_socket(&mut conn, mock, &config, &mut tasks).await;

        assert_eq!(conn.state(), crate::ConnectionState::Closed);
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_eof_during_command_reports_closed_by_server() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"NOOP\r\n")
            .build();
        let errors = Log::default();
        let mut conn = opened(&errors, |conn, _| {
            conn.write("NOOP", None, |_, _| panic!("no reply expected"));
        });
        let config = Config::new("mx.example.com");
        let (_tasks_tx, mut tasks) = mpsc::unbounded_channel();

        run_socket(&mut conn, mock, &config, &mut tasks).await;

        assert!(conn.is_broken());
        assert!(conn.is_closed());
        assert_eq!(*errors.lock().unwrap(), vec!["connection was closed by server"]);
    }

    #[tokio::test]
    async fn test_failed_upgrade_breaks_connection() {
        let mock = Builder::new().read(b"220 ready\r\n").build();
        let errors = Log::default();
        let outcome = Log::default();
        let seen = outcome.clone();
        let mut conn = opened(&errors, move |conn, _| {
            conn.upgrade_to_secure(move |_, result| {
                seen.lock().unwrap().push(result.unwrap_err().to_string());
            });
        });
        let config = Config::new("mx.example.com");
        let (_tasks_tx, mut tasks) = mpsc::unbounded_channel();

        run_socket(&mut conn, mock, &config, &mut tasks).await;

        assert_eq!(
            *outcome.lock().unwrap(),
            vec!["Protocol error: no TLS on a scripted socket"]
        );
        assert_eq!(conn.state(), crate::ConnectionState::Broken);
        assert!(errors.lock().unwrap().is_empty());
    }
}
