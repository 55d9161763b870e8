//! Wire framing boundary: turning payloads into frames and bytes back into
//! frames.
//!
//! A codec reports exactly one of three things for inbound bytes: not enough
//! data yet, one complete frame, or a malformed header. Dockers loop on this
//! until the buffer runs dry.

use bytes::BytesMut;

use crate::core::FramingError;

use super::package::PackageFraming;
use super::plain::PlainFraming;

/// Frame classification shared by all wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Application payload (possibly one fragment of it).
    Data,

    /// Acknowledgment of a data or heartbeat frame, matched by serial.
    Ack,

    /// Keep-alive.
    Heartbeat,
}

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Frame classification.
    pub kind: FrameKind,
    /// Correlation id; `0` when the format has none.
    pub serial: u32,
    /// Fragment index within the message.
    pub index: u16,
    /// Declared fragment count for the message.
    pub count: u16,
    /// Frame payload bytes.
    pub payload: Vec<u8>,
}

/// Result of one decode attempt against buffered bytes.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Not enough bytes for a complete frame; wait for more.
    Insufficient,

    /// One complete frame; its bytes were consumed from the buffer.
    Frame(WireFrame),

    /// The buffered bytes do not form a valid frame.
    Malformed(FramingError),
}

/// Capability bundle for one wire format.
///
/// Dockers are format-agnostic: every difference between wire formats lives
/// behind this trait, selected through [`Protocol`].
pub trait Framing: Send {
    /// Whether data frames of this format require acknowledgment.
    fn needs_ack(&self) -> bool;

    /// Serialize a payload into one or more wire-ready frames, splitting at
    /// `max_payload` bytes per fragment.
    fn frame(
        &mut self,
        kind: FrameKind,
        serial: u32,
        payload: &[u8],
        max_payload: usize,
    ) -> Vec<Vec<u8>>;

    /// Attempt to decode one frame from the front of `buf`, consuming its
    /// bytes on success.
    fn unframe(&mut self, buf: &mut BytesMut) -> FrameOutcome;

    /// Payload of an outgoing keep-alive.
    fn heartbeat_payload(&self) -> Vec<u8>;

    /// Reply payload for an inbound keep-alive, if this format answers them
    /// directly (rather than through acknowledgments).
    fn heartbeat_reply(&self, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Wire format selector for docker construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Framed, fragmenting, acknowledged format.
    Package,

    /// One datagram per message, fire-and-forget.
    Plain,
}

impl Protocol {
    /// Build the framing codec for this protocol.
    pub fn framing(self) -> Box<dyn Framing> {
        match self {
            Protocol::Package => Box::new(PackageFraming::new()),
            Protocol::Plain => Box::new(PlainFraming::new()),
        }
    }
}
