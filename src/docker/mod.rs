//! Docker: the per-peer worker binding one connection to the dock.
//!
//! A docker owns the wire-format state for its peer: the carry-over buffer
//! of bytes that did not yet form a complete frame, and the serial counter
//! for outbound ships. It never touches sockets itself; the gate writes the
//! fragments it produces through the bound connection and hands inbound
//! bytes back in.

mod framing;
mod package;
mod plain;

pub use framing::{FrameKind, FrameOutcome, Framing, Protocol, WireFrame};
pub use package::PackageFraming;
pub use plain::PlainFraming;

use std::time::Instant;

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::core::{AddressPair, FramingError, TransportConfig};
use crate::ship::{Arrival, Departure, DepartureKind, Dock, Priority};

/// Events a docker produces while processing traffic.
#[derive(Debug)]
pub enum DockerEvent {
    /// A complete inbound message.
    ShipReceived(Arrival),

    /// An outbound data ship completed (written, or acknowledged when the
    /// format requires it).
    ShipSent {
        /// Serial of the completed departure.
        serial: u32,
        /// Its destination pair.
        pair: AddressPair,
    },

    /// Inbound bytes violated the wire format. The connection is unaffected.
    Violation {
        /// What was wrong with the bytes.
        error: FramingError,
        /// The peer that sent them.
        pair: AddressPair,
    },
}

/// Per-peer worker for one address pair.
pub struct Docker {
    pair: AddressPair,
    framing: Box<dyn Framing>,
    /// Bytes received ahead of a complete frame, including any "advance
    /// party" seen before this docker existed.
    buffer: BytesMut,
    next_serial: u32,
    max_payload: usize,
}

impl Docker {
    /// Create a docker for a pair, selecting the wire format by protocol.
    pub fn new(pair: AddressPair, protocol: Protocol, config: &TransportConfig) -> Self {
        Self {
            pair,
            framing: protocol.framing(),
            buffer: BytesMut::new(),
            next_serial: 1,
            max_payload: config.max_payload,
        }
    }

    /// The pair this docker serves.
    pub fn pair(&self) -> AddressPair {
        self.pair
    }

    fn alloc_serial(&mut self) -> u32 {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1).max(1);
        serial
    }

    /// Wrap a payload as a data departure and enqueue it on the dock.
    /// Returns the assigned serial.
    pub fn enqueue(
        &mut self,
        payload: &[u8],
        priority: Priority,
        dock: &mut Dock,
        now: Instant,
    ) -> u32 {
        let serial = self.alloc_serial();
        let fragments = self
            .framing
            .frame(FrameKind::Data, serial, payload, self.max_payload);
        let departure = Departure::new(self.pair, serial, DepartureKind::Data, priority)
            .with_payload(payload.to_vec())
            .with_fragments(fragments)
            .with_ack_required(self.framing.needs_ack());
        dock.append(departure, now);
        trace!(pair = %self.pair, serial, "departure enqueued");
        serial
    }

    /// Enqueue the minimal keep-alive at highest priority.
    pub fn heartbeat(&mut self, dock: &mut Dock, now: Instant) {
        let needs_ack = self.framing.needs_ack();
        let serial = if needs_ack { self.alloc_serial() } else { 0 };
        let payload = self.framing.heartbeat_payload();
        let fragments = self
            .framing
            .frame(FrameKind::Heartbeat, serial, &payload, self.max_payload);
        let departure = Departure::new(self.pair, serial, DepartureKind::Heartbeat, Priority::Critical)
            .with_fragments(fragments)
            .with_ack_required(needs_ack);
        dock.append(departure, now);
        trace!(pair = %self.pair, "heartbeat enqueued");
    }

    /// Unframe received bytes, feeding complete data frames into the dock's
    /// reassembly and resolving acknowledgments.
    ///
    /// A malformed header discards the buffered bytes and is reported as a
    /// protocol violation; processing resumes with the next receive.
    pub fn process_received(
        &mut self,
        bytes: &[u8],
        dock: &mut Dock,
        now: Instant,
    ) -> Vec<DockerEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            match self.framing.unframe(&mut self.buffer) {
                FrameOutcome::Insufficient => break,
                FrameOutcome::Malformed(error) => {
                    warn!(pair = %self.pair, %error, "malformed frame, discarding buffer");
                    self.buffer.clear();
                    events.push(DockerEvent::Violation {
                        error,
                        pair: self.pair,
                    });
                    break;
                }
                FrameOutcome::Frame(frame) => self.handle_frame(frame, dock, now, &mut events),
            }
        }
        events
    }

    fn handle_frame(
        &mut self,
        frame: WireFrame,
        dock: &mut Dock,
        now: Instant,
        events: &mut Vec<DockerEvent>,
    ) {
        match frame.kind {
            FrameKind::Data => {
                let serial = frame.serial;
                if let Some(arrival) = dock.append_fragment(
                    self.pair,
                    serial,
                    frame.index,
                    frame.count,
                    frame.payload,
                    now,
                ) {
                    // Acknowledge only complete messages; a partially
                    // delivered departure must keep retransmitting. A
                    // retransmit of a completed message is re-acknowledged
                    // in case the first ack was lost.
                    if self.framing.needs_ack() {
                        self.enqueue_ack(serial, dock, now);
                    }
                    events.push(DockerEvent::ShipReceived(arrival));
                }
            }
            FrameKind::Ack => {
                if let Some(acked) = dock.acknowledge(&self.pair, frame.serial) {
                    if acked.kind() == DepartureKind::Data {
                        events.push(DockerEvent::ShipSent {
                            serial: acked.serial(),
                            pair: self.pair,
                        });
                    }
                }
            }
            FrameKind::Heartbeat => {
                if self.framing.needs_ack() {
                    self.enqueue_ack(frame.serial, dock, now);
                } else if let Some(reply) = self.framing.heartbeat_reply(&frame.payload) {
                    let fragments =
                        self.framing
                            .frame(FrameKind::Heartbeat, 0, &reply, self.max_payload);
                    let departure =
                        Departure::new(self.pair, 0, DepartureKind::Heartbeat, Priority::Critical)
                            .with_fragments(fragments);
                    dock.append(departure, now);
                }
            }
        }
    }

    fn enqueue_ack(&mut self, serial: u32, dock: &mut Dock, now: Instant) {
        let fragments = self
            .framing
            .frame(FrameKind::Ack, serial, &[], self.max_payload);
        let departure = Departure::new(self.pair, serial, DepartureKind::Ack, Priority::Critical)
            .with_fragments(fragments);
        dock.append(departure, now);
    }

    /// Pull the next ready departure addressed to this docker's peer.
    pub fn next_ready(&mut self, dock: &mut Dock, now: Instant) -> Option<Departure> {
        dock.next_departure(now, &self.pair)
    }

    /// Conclude one write attempt.
    ///
    /// On failure the departure goes back to the dock for retry; on success
    /// it either finishes (fire-and-forget) or stays pending until its
    /// acknowledgment arrives.
    pub fn settle(
        &mut self,
        departure: Departure,
        wrote: bool,
        dock: &mut Dock,
        now: Instant,
    ) -> Option<DockerEvent> {
        if !wrote {
            dock.push_retry(departure, now);
            return None;
        }
        if departure.need_ack() {
            dock.push_pending_ack(departure, now);
            return None;
        }
        if departure.kind() == DepartureKind::Data {
            return Some(DockerEvent::ShipSent {
                serial: departure.serial(),
                pair: departure.pair(),
            });
        }
        None
    }
}
