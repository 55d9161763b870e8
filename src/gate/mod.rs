//! Gate: the application-facing facade.
//!
//! A gate composes one [`Hub`], one [`Dock`], and a registry of per-peer
//! [`Docker`]s, and feeds lifecycle and data events to the application
//! through a bounded queue. One gate is driven by exactly one runner; within
//! that loop nothing blocks and nothing is shared across gates.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::core::registry::Registry;
use crate::core::{AddressPair, FramingError, StarError, TransportConfig};
use crate::docker::{Docker, DockerEvent, Protocol};
use crate::runner::Processor;
use crate::ship::{Arrival, DepartureKind, DepartureStatus, Dock, Priority};
use crate::transport::{Channel, ConnectionState, Hub};

/// Why an outbound ship failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShipFault {
    /// Every write attempt failed and the retry budget is spent.
    #[error("retries exhausted")]
    RetriesExhausted,

    /// The departure's absolute expiry deadline passed.
    #[error("departure expired")]
    Expired,

    /// Inbound bytes violated the wire format.
    #[error("protocol violation: {0}")]
    Violation(#[from] FramingError),
}

/// Events delivered to the application.
#[derive(Debug)]
pub enum GateEvent {
    /// A connection changed lifecycle state.
    ConnectionStateChanged {
        /// State before the transition.
        previous: ConnectionState,
        /// State after the transition.
        current: ConnectionState,
        /// The connection's address pair.
        pair: AddressPair,
    },

    /// A complete inbound message.
    ShipReceived(Arrival),

    /// An outbound data ship completed.
    ShipSent {
        /// Serial returned by [`Gate::submit`].
        serial: u32,
        /// Destination pair.
        pair: AddressPair,
    },

    /// An outbound ship failed, or a peer sent malformed bytes.
    ShipError {
        /// What went wrong.
        reason: ShipFault,
        /// Serial of the failed departure; `None` for inbound violations.
        serial: Option<u32>,
        /// The pair involved.
        pair: AddressPair,
    },
}

/// The facade over hub, dock, and docker registry.
pub struct Gate {
    config: TransportConfig,
    protocol: Protocol,
    hub: Hub,
    dock: Dock,
    dockers: Registry<Docker>,
    events: mpsc::Sender<GateEvent>,
    /// Round-robin start slot for departure dispatch.
    cursor: usize,
}

impl Gate {
    /// Create a gate and the event receiver the application consumes.
    pub fn new(config: TransportConfig, protocol: Protocol) -> (Self, mpsc::Receiver<GateEvent>) {
        let (events, receiver) = mpsc::channel(config.event_capacity.max(1));
        let hub = Hub::new(config.clone());
        let dock = Dock::new(&config);
        let gate = Self {
            config,
            protocol,
            hub,
            dock,
            dockers: Registry::new(),
            events,
            cursor: 0,
        };
        (gate, receiver)
    }

    /// The gate's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of live dockers.
    pub fn docker_count(&self) -> usize {
        self.dockers.len()
    }

    /// Bind a UDP port for inbound traffic, returning the bound address.
    #[cfg(feature = "transport")]
    pub async fn open(&mut self, local: SocketAddr) -> Result<SocketAddr, StarError> {
        self.hub.open(local).await
    }

    /// Attach a pre-built channel (custom transports, tests).
    pub fn attach(&mut self, local: Option<SocketAddr>, channel: Arc<dyn Channel>) {
        self.hub.attach(local, channel);
    }

    /// Enqueue a payload for `(destination, source)` at normal priority.
    /// Returns whether it was accepted.
    pub fn send_data(
        &mut self,
        payload: &[u8],
        source: Option<SocketAddr>,
        destination: SocketAddr,
    ) -> bool {
        self.submit(payload, source, destination, Priority::Normal)
            .is_some()
    }

    /// Enqueue a payload with an explicit priority, returning its serial for
    /// later cancellation or `ShipSent` correlation.
    pub fn submit(
        &mut self,
        payload: &[u8],
        source: Option<SocketAddr>,
        destination: SocketAddr,
        priority: Priority,
    ) -> Option<u32> {
        self.submit_at(payload, source, destination, priority, Instant::now())
    }

    /// [`submit`](Gate::submit) with an injected clock.
    pub fn submit_at(
        &mut self,
        payload: &[u8],
        source: Option<SocketAddr>,
        destination: SocketAddr,
        priority: Priority,
        now: Instant,
    ) -> Option<u32> {
        let pair = AddressPair::new(destination, source);
        if !self.hub.contains(&pair) {
            if let Err(error) = self.hub.connect(destination, source, now) {
                warn!(%pair, %error, "cannot open connection for send");
                return None;
            }
        }
        if !self.dockers.contains(&pair) {
            self.register_docker(pair);
        }
        let docker = self.dockers.get_mut(&pair)?;
        Some(docker.enqueue(payload, priority, &mut self.dock, now))
    }

    /// Cancel a pending departure by identity. Only departures that were
    /// never written can be cancelled.
    pub fn cancel(
        &mut self,
        destination: SocketAddr,
        source: Option<SocketAddr>,
        serial: u32,
    ) -> bool {
        let pair = AddressPair::new(destination, source);
        self.dock.cancel(&pair, serial).is_some()
    }

    /// One full tick: hub I/O pass, inbound routing, lifecycle reactions,
    /// round-robin departure dispatch, and the dock sweep.
    ///
    /// Returns whether anything happened; the runner idles when it did not.
    /// A single peer's failure never halts the pass for other peers.
    pub fn process_at(&mut self, now: Instant) -> bool {
        let report = self.hub.process_at(now);
        let mut activity = !report.is_idle();

        for (pair, bytes) in report.inbound {
            if !self.dockers.contains(&pair) {
                // Advance party: bytes arrived before any docker existed.
                self.register_docker(pair);
            }
            let Some(docker) = self.dockers.get_mut(&pair) else {
                continue;
            };
            for event in docker.process_received(&bytes, &mut self.dock, now) {
                Self::forward(&self.events, event);
            }
        }

        for change in report.changes {
            Self::emit(
                &self.events,
                GateEvent::ConnectionStateChanged {
                    previous: change.previous,
                    current: change.current,
                    pair: change.pair,
                },
            );
            match change.current {
                ConnectionState::Expired => self.heartbeat(change.pair, now),
                ConnectionState::Error => self.teardown(change.pair),
                _ => {}
            }
        }

        activity |= self.dispatch(now);

        for departure in self.dock.sweep(now) {
            if departure.kind() != DepartureKind::Data {
                continue;
            }
            let reason = match departure.status() {
                DepartureStatus::Expired => ShipFault::Expired,
                _ => ShipFault::RetriesExhausted,
            };
            activity = true;
            Self::emit(
                &self.events,
                GateEvent::ShipError {
                    reason,
                    serial: Some(departure.serial()),
                    pair: departure.pair(),
                },
            );
        }

        activity
    }

    /// Round-robin over the docker registry, writing every ready departure
    /// through its bound connection.
    fn dispatch(&mut self, now: Instant) -> bool {
        let mut wrote_any = false;
        let slots = self.dockers.slot_count();
        for offset in 0..slots {
            let slot = (self.cursor + offset) % slots;
            let Some(docker) = self.dockers.slot_mut(slot) else {
                continue;
            };
            let pair = docker.pair();
            while let Some(departure) = docker.next_ready(&mut self.dock, now) {
                wrote_any = true;
                let wrote = match self.hub.get_mut(&pair) {
                    Some(connection) if connection.is_usable() => {
                        let mut wrote = true;
                        for fragment in departure.fragments() {
                            if let Err(error) = connection.send(fragment, now) {
                                trace!(%pair, %error, "write failed, scheduling retry");
                                wrote = false;
                                break;
                            }
                        }
                        wrote
                    }
                    _ => false,
                };
                if let Some(event) = docker.settle(departure, wrote, &mut self.dock, now) {
                    Self::forward(&self.events, event);
                }
            }
        }
        if slots > 0 {
            self.cursor = (self.cursor + 1) % slots;
        }
        wrote_any
    }

    fn register_docker(&mut self, pair: AddressPair) {
        let docker = Docker::new(pair, self.protocol, &self.config);
        self.dockers.insert(pair, docker);
        if let Some(connection) = self.hub.get_mut(&pair) {
            connection.set_heartbeat_enabled(true);
        }
        debug!(%pair, "docker registered");
    }

    fn heartbeat(&mut self, pair: AddressPair, now: Instant) {
        let Some(connection) = self.hub.get_mut(&pair) else {
            return;
        };
        if !connection.heartbeat_enabled() {
            return;
        }
        let Some(docker) = self.dockers.get_mut(&pair) else {
            return;
        };
        docker.heartbeat(&mut self.dock, now);
        connection.mark_heartbeat_sent();
    }

    /// Dockers never outlive their connection: remove the docker, drop the
    /// hub entry, and fail whatever was still queued for the peer.
    fn teardown(&mut self, pair: AddressPair) {
        if self.dockers.remove(&pair).is_some() {
            debug!(%pair, "docker removed");
        }
        self.hub.disconnect(&pair);
        self.dock.fail_pair(&pair);
    }

    fn forward(sender: &mpsc::Sender<GateEvent>, event: DockerEvent) {
        let event = match event {
            DockerEvent::ShipReceived(arrival) => GateEvent::ShipReceived(arrival),
            DockerEvent::ShipSent { serial, pair } => GateEvent::ShipSent { serial, pair },
            DockerEvent::Violation { error, pair } => GateEvent::ShipError {
                reason: ShipFault::Violation(error),
                serial: None,
                pair,
            },
        };
        Self::emit(sender, event);
    }

    fn emit(sender: &mpsc::Sender<GateEvent>, event: GateEvent) {
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("event receiver dropped");
            }
        }
    }
}

impl Processor for Gate {
    fn process(&mut self) -> bool {
        self.process_at(Instant::now())
    }
}
