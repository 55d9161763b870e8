//! Connection health state machine.
//!
//! All transitions are timestamp-driven and evaluated on every tick; the
//! machine performs no I/O and sets no timers. One tick moves at most one
//! step, so the degradation sequence is always
//! `Ready -> Expired -> Maintaining -> Error`, never skipping a state.
//!
//! Connections that cannot heartbeat fail directly from `Expired` once the
//! dead-line passes.

use std::time::{Duration, Instant};

use crate::core::AddressPair;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Just created, no I/O attempted yet.
    Default,

    /// First send or receive attempted, no receive observed yet.
    Preparing,

    /// Recent successful receive.
    Ready,

    /// No receive within the freshness window; a heartbeat is due.
    Expired,

    /// Heartbeat dispatched, awaiting a response.
    Maintaining,

    /// Dead. Terminal: the connection is removed, never revived.
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Default => "default",
            ConnectionState::Preparing => "preparing",
            ConnectionState::Ready => "ready",
            ConnectionState::Expired => "expired",
            ConnectionState::Maintaining => "maintaining",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// One observed transition, reported exactly once per edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State before the tick.
    pub previous: ConnectionState,
    /// State after the tick.
    pub current: ConnectionState,
    /// The connection's address pair.
    pub pair: AddressPair,
}

/// Signals the machine reads on each tick.
#[derive(Debug, Clone, Copy)]
pub struct StateContext {
    /// Timestamp of the last successful receive, if any.
    pub last_received: Option<Instant>,
    /// Whether any send or receive has ever been attempted.
    pub attempted: bool,
    /// Whether a heartbeat was dispatched since the connection went stale.
    pub heartbeat_sent: bool,
    /// Whether the underlying channel reported a fatal error or was closed.
    pub closed: bool,
}

/// The state machine itself. Owns no I/O.
#[derive(Debug)]
pub struct StateMachine {
    state: ConnectionState,
    expires: Duration,
    death: Duration,
    created: Instant,
}

impl StateMachine {
    /// Create a machine in `Default` state.
    ///
    /// `expires` is the freshness window; `death` is the dead-line (normally
    /// twice the freshness window).
    pub fn new(expires: Duration, death: Duration, now: Instant) -> Self {
        Self {
            state: ConnectionState::Default,
            expires,
            death,
            created: now,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Evaluate one tick, returning the transition if the state changed.
    pub fn advance(
        &mut self,
        now: Instant,
        ctx: &StateContext,
    ) -> Option<(ConnectionState, ConnectionState)> {
        let fresh = ctx
            .last_received
            .is_some_and(|t| now.duration_since(t) < self.expires);
        let dead = ctx
            .last_received
            .is_some_and(|t| now.duration_since(t) >= self.death);

        let next = if ctx.closed {
            ConnectionState::Error
        } else {
            match self.state {
                ConnectionState::Error => ConnectionState::Error,
                ConnectionState::Default => {
                    if ctx.attempted {
                        ConnectionState::Preparing
                    } else {
                        ConnectionState::Default
                    }
                }
                ConnectionState::Preparing => {
                    if ctx.last_received.is_some() {
                        ConnectionState::Ready
                    } else if now.duration_since(self.created) >= self.death {
                        // Peer never answered at all.
                        ConnectionState::Error
                    } else {
                        ConnectionState::Preparing
                    }
                }
                ConnectionState::Ready => {
                    if fresh {
                        ConnectionState::Ready
                    } else {
                        ConnectionState::Expired
                    }
                }
                ConnectionState::Expired => {
                    if fresh {
                        ConnectionState::Ready
                    } else if ctx.heartbeat_sent {
                        ConnectionState::Maintaining
                    } else if dead {
                        ConnectionState::Error
                    } else {
                        ConnectionState::Expired
                    }
                }
                ConnectionState::Maintaining => {
                    if fresh {
                        ConnectionState::Ready
                    } else if dead {
                        ConnectionState::Error
                    } else {
                        ConnectionState::Maintaining
                    }
                }
            }
        };

        if next == self.state {
            return None;
        }
        let previous = self.state;
        self.state = next;
        Some((previous, next))
    }
}
