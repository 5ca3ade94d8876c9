//! Connection state types.
//!
//! The transport and the pending reply slot live *inside* the states that
//! have a socket, so a broken or closed connection cannot hold either.

use std::fmt;

use super::ReplyHandler;
use crate::transport::Transport;

/// Observable state of a [`Connection`](super::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never opened, or shut down by us after a QUIT.
    Closed,
    /// Connect in progress; the greeting handler is armed.
    Connecting,
    /// Checked out to a caller.
    Active,
    /// Parked in the pool, available for reuse.
    Idle,
    /// QUIT in progress; not available to the pool.
    ShuttingDown,
    /// Unusable after a fault or an explicit break.
    Broken,
}

impl ConnectionState {
    /// Returns true if the connection holds a socket.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Idle | Self::ShuttingDown)
    }

    /// Returns true if the connection can never be used again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Broken)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::ShuttingDown => "shutting down",
            Self::Broken => "broken",
        };
        f.write_str(name)
    }
}

/// A socket plus the single reply correlation slot.
pub(super) struct Live {
    pub(super) transport: Box<dyn Transport>,
    pub(super) pending: Option<ReplyHandler>,
}

/// State with its data.
pub(super) enum Phase {
    Closed,
    Connecting { on_greeting: Option<ReplyHandler> },
    Active(Live),
    Idle(Live),
    ShuttingDown(Live),
    Broken,
}

impl Phase {
    pub(super) const fn tag(&self) -> ConnectionState {
        match self {
            Self::Closed => ConnectionState::Closed,
            Self::Connecting { .. } => ConnectionState::Connecting,
            Self::Active(_) => ConnectionState::Active,
            Self::Idle(_) => ConnectionState::Idle,
            Self::ShuttingDown(_) => ConnectionState::ShuttingDown,
            Self::Broken => ConnectionState::Broken,
        }
    }

    pub(super) const fn live(&self) -> Option<&Live> {
        match self {
            Self::Active(live) | Self::Idle(live) | Self::ShuttingDown(live) => Some(live),
            _ => None,
        }
    }

    pub(super) fn live_mut(&mut self) -> Option<&mut Live> {
        match self {
            Self::Active(live) | Self::Idle(live) | Self::ShuttingDown(live) => Some(live),
            _ => None,
        }
    }

    pub(super) fn into_live(self) -> Option<Live> {
        match self {
            Self::Active(live) | Self::Idle(live) | Self::ShuttingDown(live) => Some(live),
            _ => None,
        }
    }

    /// Moves the socket into a new live state; other states are returned
    /// unchanged.
    pub(super) fn relabel(self, to: fn(Live) -> Self) -> Self {
        match self {
            Self::Active(live) | Self::Idle(live) | Self::ShuttingDown(live) => to(live),
            other => other,
        }
    }
}
