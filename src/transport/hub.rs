//! Hub: owner of the connection registry and the non-blocking I/O pass.
//!
//! One hub owns one or more port channels (one per local address) and every
//! connection riding on them. Datagrams are demultiplexed to connections by
//! their address pair; unknown senders get a connection created on demand.
//! All socket I/O happens inside [`process_at`], driven by a single runner.
//!
//! [`process_at`]: Hub::process_at

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::core::registry::Registry;
use crate::core::{constants, AddressPair, StarError, TransportConfig};

use super::channel::Channel;
use super::connection::Connection;
use super::state::{ConnectionState, StateChange};

/// Outcome of one hub poll pass.
#[derive(Debug, Default)]
pub struct HubReport {
    /// Inbound datagrams, paired with the connection they belong to.
    pub inbound: Vec<(AddressPair, Vec<u8>)>,
    /// State transitions that fired this pass.
    pub changes: Vec<StateChange>,
}

impl HubReport {
    /// Whether the pass observed no traffic and no transitions.
    pub fn is_idle(&self) -> bool {
        self.inbound.is_empty() && self.changes.is_empty()
    }
}

/// The connection registry plus its port channels.
pub struct Hub {
    config: TransportConfig,
    /// Port channels keyed by pinned local address; `None` is the lazily
    /// bound wildcard port used for sends with no pinned source.
    ports: FxHashMap<Option<SocketAddr>, Arc<dyn Channel>>,
    connections: Registry<Connection>,
    recv_buf: Vec<u8>,
}

impl Hub {
    /// Create a hub with no ports and no connections.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            ports: FxHashMap::default(),
            connections: Registry::new(),
            recv_buf: vec![0u8; constants::RECV_BUFFER_SIZE],
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the hub has no live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether a connection exists for the pair.
    pub fn contains(&self, pair: &AddressPair) -> bool {
        self.connections.contains(pair)
    }

    /// Look up a connection.
    pub fn get(&self, pair: &AddressPair) -> Option<&Connection> {
        self.connections.get(pair)
    }

    /// Look up a connection mutably.
    pub fn get_mut(&mut self, pair: &AddressPair) -> Option<&mut Connection> {
        self.connections.get_mut(pair)
    }

    /// Attach a pre-built channel for a local address key. Used for custom
    /// transports and tests; UDP ports normally come from [`open`] or the
    /// lazy bind in [`connect`].
    ///
    /// [`open`]: Hub::open
    /// [`connect`]: Hub::connect
    pub fn attach(&mut self, local: Option<SocketAddr>, channel: Arc<dyn Channel>) {
        self.ports.insert(local, channel);
    }

    /// Bind a UDP port for a pinned local address, returning the actual
    /// bound address (relevant for port 0).
    #[cfg(feature = "transport")]
    pub async fn open(&mut self, local: SocketAddr) -> Result<SocketAddr, StarError> {
        let channel = super::channel::UdpChannel::bind(local).await?;
        let actual = channel.local_addr()?;
        debug!(%actual, "port opened");
        self.ports.insert(Some(actual), Arc::new(channel));
        Ok(actual)
    }

    /// Get or create the connection for `(remote, local)`.
    ///
    /// Idempotent: an existing connection is returned untouched. For
    /// connectionless transports the port socket is opened lazily.
    pub fn connect(
        &mut self,
        remote: SocketAddr,
        local: Option<SocketAddr>,
        now: Instant,
    ) -> Result<&mut Connection, StarError> {
        let pair = AddressPair::new(remote, local);
        if !self.connections.contains(&pair) {
            let channel = self.port_for(local, remote)?;
            debug!(%pair, "connection created");
            self.connections
                .insert(pair, Connection::new(pair, channel, &self.config, now));
        }
        Ok(self.connections.get_mut(&pair).expect("just inserted"))
    }

    /// Remove the connection for a pair. The second call is a no-op and
    /// produces no further events. The port channel stays open for sibling
    /// pairs sharing the local address.
    pub fn disconnect(&mut self, pair: &AddressPair) -> bool {
        match self.connections.remove(pair) {
            Some(_) => {
                debug!(%pair, "connection removed");
                true
            }
            None => false,
        }
    }

    /// One non-blocking I/O pass: drain every port, route datagrams to their
    /// connections (creating them on demand), advance every state machine,
    /// and reap dead connections.
    pub fn process_at(&mut self, now: Instant) -> HubReport {
        let mut report = HubReport::default();

        let port_keys: Vec<Option<SocketAddr>> = self.ports.keys().copied().collect();
        for key in port_keys {
            let channel = Arc::clone(&self.ports[&key]);
            loop {
                match channel.try_receive(&mut self.recv_buf) {
                    Ok(Some((len, remote))) => {
                        let data = self.recv_buf[..len].to_vec();
                        let pair = AddressPair::new(remote, key);
                        if !self.connections.contains(&pair) {
                            debug!(%pair, "connection created for inbound peer");
                            self.connections.insert(
                                pair,
                                Connection::new(pair, Arc::clone(&channel), &self.config, now),
                            );
                        }
                        let connection = self.connections.get_mut(&pair).expect("just ensured");
                        connection.on_received(now);
                        trace!(%pair, len, "datagram received");
                        report.inbound.push((pair, data));
                    }
                    Ok(None) => break,
                    Err(error) => {
                        // The channel latches itself closed; the affected
                        // connections fail on the tick below.
                        warn!(local = ?key, %error, "port receive failed");
                        break;
                    }
                }
            }
        }

        for pair in self.connections.pairs() {
            let Some(connection) = self.connections.get_mut(&pair) else {
                continue;
            };
            if let Some(change) = connection.tick(now) {
                debug!(%pair, previous = %change.previous, current = %change.current,
                    "connection state changed");
                if change.current == ConnectionState::Error {
                    self.connections.remove(&pair);
                }
                report.changes.push(change);
            }
        }

        report
    }

    #[cfg(feature = "transport")]
    fn port_for(
        &mut self,
        local: Option<SocketAddr>,
        remote: SocketAddr,
    ) -> Result<Arc<dyn Channel>, StarError> {
        if let Some(channel) = self.ports.get(&local) {
            return Ok(Arc::clone(channel));
        }
        let bind_addr = match local {
            Some(addr) => addr,
            None => wildcard_for(remote),
        };
        let channel: Arc<dyn Channel> =
            Arc::new(super::channel::UdpChannel::bind_std(bind_addr)?);
        debug!(local = ?local, bound = ?channel.local_addr().ok(), "port opened lazily");
        self.ports.insert(local, Arc::clone(&channel));
        Ok(channel)
    }

    #[cfg(not(feature = "transport"))]
    fn port_for(
        &mut self,
        local: Option<SocketAddr>,
        _remote: SocketAddr,
    ) -> Result<Arc<dyn Channel>, StarError> {
        self.ports
            .get(&local)
            .map(Arc::clone)
            .ok_or(StarError::NoChannel)
    }
}

/// Unspecified bind address in the remote's address family.
#[cfg(feature = "transport")]
fn wildcard_for(remote: SocketAddr) -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    let ip: IpAddr = if remote.is_ipv4() {
        Ipv4Addr::UNSPECIFIED.into()
    } else {
        Ipv6Addr::UNSPECIFIED.into()
    };
    SocketAddr::new(ip, 0)
}
