//! Graceful close with QUIT.
//!
//! QUIT is best effort: a negative reply, an error or a missing reply all end
//! the same way, with the socket released. Only the first of them counts.

use std::time::Instant;

use tracing::{debug, warn};

use crate::connection::Connection;

/// Sends QUIT and arms the timeout that bounds the wait for its reply.
pub(crate) fn start(conn: &mut Connection) {
    conn.set_error_handler(|conn, err| {
        debug!(conn = %conn.id(), %err, "QUIT failed, ignoring");
        finish(conn);
    });

    let timeout = conn.quit_timeout();
    conn.arm_timer(Instant::now() + timeout, move |conn| {
        warn!(conn = %conn.id(), ?timeout, "timeout waiting for QUIT reply, closing");
        finish(conn);
    });

    conn.write("QUIT", None, |conn, reply| {
        if !reply.is_success() {
            warn!(conn = %conn.id(), %reply, "QUIT failed");
        }
        finish(conn);
    });
}

fn finish(conn: &mut Connection) {
    conn.disarm_timer();
    conn.shutdown();
}
