//! One addressed connection over a shared channel.

use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use crate::core::{AddressPair, ChannelError, TransportConfig};

use super::channel::Channel;
use super::state::{ConnectionState, StateChange, StateContext, StateMachine};

/// A logical connection to one peer.
///
/// Owns the state machine and activity timestamps for its address pair.
/// Outbound datagrams go through the shared channel; inbound datagrams are
/// demultiplexed by the hub, which records them here via [`on_received`].
///
/// [`on_received`]: Connection::on_received
pub struct Connection {
    pair: AddressPair,
    channel: Arc<dyn Channel>,
    machine: StateMachine,
    last_sent: Option<Instant>,
    last_received: Option<Instant>,
    attempted: bool,
    /// Set when a heartbeat was dispatched for the current stale period.
    heartbeat_marked: bool,
    /// Capability flag set by the owning docker, not a type check.
    heartbeat_enabled: bool,
    /// Latched on the first fatal send error.
    failed: bool,
}

impl Connection {
    /// Create a connection in `Default` state.
    pub fn new(
        pair: AddressPair,
        channel: Arc<dyn Channel>,
        config: &TransportConfig,
        now: Instant,
    ) -> Self {
        Self {
            pair,
            channel,
            machine: StateMachine::new(config.expires, config.death_line(), now),
            last_sent: None,
            last_received: None,
            attempted: false,
            heartbeat_marked: false,
            heartbeat_enabled: false,
            failed: false,
        }
    }

    /// The address pair this connection serves.
    pub fn pair(&self) -> AddressPair {
        self.pair
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Whether the connection can still carry traffic.
    pub fn is_usable(&self) -> bool {
        self.state() != ConnectionState::Error
    }

    /// Timestamp of the last successful send.
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// Timestamp of the last receive.
    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    /// Whether this connection participates in heartbeating.
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_enabled
    }

    /// Enable or disable heartbeating; set by the owning docker.
    pub fn set_heartbeat_enabled(&mut self, enabled: bool) {
        self.heartbeat_enabled = enabled;
    }

    /// Record that a heartbeat was dispatched for the current stale period.
    pub fn mark_heartbeat_sent(&mut self) {
        self.heartbeat_marked = true;
    }

    /// Write one datagram to the peer.
    ///
    /// A successful write refreshes the send timestamp. `WouldBlock` is
    /// retryable and leaves the state untouched; any other failure latches
    /// the connection toward `Error` on the next tick.
    pub fn send(&mut self, data: &[u8], now: Instant) -> Result<usize, ChannelError> {
        self.attempted = true;
        match self.channel.try_send(data, self.pair.remote()) {
            Ok(count) => {
                self.last_sent = Some(now);
                trace!(pair = %self.pair, count, "datagram sent");
                Ok(count)
            }
            Err(ChannelError::WouldBlock) => Err(ChannelError::WouldBlock),
            Err(error) => {
                self.failed = true;
                Err(error)
            }
        }
    }

    /// Record an inbound datagram delivered by the hub.
    pub fn on_received(&mut self, now: Instant) {
        self.attempted = true;
        self.last_received = Some(now);
        self.heartbeat_marked = false;
    }

    /// Advance the state machine. Returns the transition if one fired; each
    /// edge is reported exactly once.
    pub fn tick(&mut self, now: Instant) -> Option<StateChange> {
        let context = StateContext {
            last_received: self.last_received,
            attempted: self.attempted,
            heartbeat_sent: self.heartbeat_marked,
            closed: self.failed || self.channel.is_closed(),
        };
        self.machine
            .advance(now, &context)
            .map(|(previous, current)| StateChange {
                previous,
                current,
                pair: self.pair,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemoryChannel;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn connection(channel: Arc<MemoryChannel>) -> Connection {
        let pair = AddressPair::new(addr(9000), None);
        let config = TransportConfig::builder()
            .expires(Duration::from_secs(10))
            .build();
        Connection::new(pair, channel, &config, Instant::now())
    }

    #[test]
    fn test_send_updates_activity_and_state() {
        let channel = Arc::new(MemoryChannel::new(addr(1)));
        let mut conn = connection(Arc::clone(&channel));
        let now = Instant::now();

        assert_eq!(conn.state(), ConnectionState::Default);
        assert!(conn.last_sent().is_none());

        conn.send(b"hello", now).unwrap();
        assert_eq!(conn.last_sent(), Some(now));
        assert_eq!(channel.sent().len(), 1);
        assert_eq!(channel.sent()[0].1, addr(9000));

        // The attempt moves the machine out of Default.
        let change = conn.tick(now).unwrap();
        assert_eq!(change.previous, ConnectionState::Default);
        assert_eq!(change.current, ConnectionState::Preparing);
    }

    #[test]
    fn test_receive_promotes_to_ready() {
        let channel = Arc::new(MemoryChannel::new(addr(1)));
        let mut conn = connection(channel);
        let now = Instant::now();

        conn.on_received(now);
        conn.tick(now);
        let change = conn.tick(now).unwrap();
        assert_eq!(change.current, ConnectionState::Ready);
        assert!(conn.is_usable());
    }

    #[test]
    fn test_would_block_is_not_fatal() {
        let channel = Arc::new(MemoryChannel::new(addr(1)));
        let mut conn = connection(Arc::clone(&channel));
        let now = Instant::now();

        channel.reject_sends(true);
        assert!(matches!(
            conn.send(b"x", now),
            Err(ChannelError::WouldBlock)
        ));
        assert!(conn.last_sent().is_none());

        conn.tick(now);
        assert_ne!(conn.state(), ConnectionState::Error);
    }

    #[test]
    fn test_closed_channel_reported_once() {
        let channel = Arc::new(MemoryChannel::new(addr(1)));
        let mut conn = connection(Arc::clone(&channel));
        let now = Instant::now();

        channel.close();
        let change = conn.tick(now).unwrap();
        assert_eq!(change.current, ConnectionState::Error);
        assert!(!conn.is_usable());

        // Subsequent ticks report nothing further.
        assert!(conn.tick(now + Duration::from_secs(1)).is_none());
    }
}
