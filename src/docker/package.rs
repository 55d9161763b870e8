//! Package wire format: framed, fragmenting, acknowledged.
//!
//! Every frame starts with a fixed 14-byte header:
//!
//! ```text
//! +--------+--------+----------+-------------+---------+---------+---------+
//! | Magic  | Kind   | Reserved | Serial      | Index   | Count   | Length  |
//! | 2 "ST" | 1 byte | 1 byte   | 4 (LE32)    | 2 (LE16)| 2 (LE16)| 2 (LE16)|
//! +--------+--------+----------+-------------+---------+---------+---------+
//! ```
//!
//! Payloads longer than the configured maximum are split into `Count`
//! fragments sharing one serial; the receiver reassembles them in index
//! order. Data and heartbeat frames are acknowledged by an `Ack` frame
//! echoing the serial.

use bytes::{Buf, BytesMut};

use crate::core::FramingError;

use super::framing::{FrameKind, FrameOutcome, Framing, WireFrame};

/// Size constants of the package wire format.
pub mod sizes {
    /// Leading magic bytes, `"ST"`.
    pub const MAGIC: [u8; 2] = [0x53, 0x54];
    /// Fixed header size.
    pub const HEADER_SIZE: usize = 14;
}

/// Wire values for [`FrameKind`].
mod kind {
    pub const DATA: u8 = 0x01;
    pub const ACK: u8 = 0x02;
    pub const HEARTBEAT: u8 = 0x03;
}

fn kind_to_byte(kind: FrameKind) -> u8 {
    match kind {
        FrameKind::Data => kind::DATA,
        FrameKind::Ack => kind::ACK,
        FrameKind::Heartbeat => kind::HEARTBEAT,
    }
}

fn kind_from_byte(byte: u8) -> Option<FrameKind> {
    match byte {
        kind::DATA => Some(FrameKind::Data),
        kind::ACK => Some(FrameKind::Ack),
        kind::HEARTBEAT => Some(FrameKind::Heartbeat),
        _ => None,
    }
}

/// The package codec. Stateless: partial-frame carry-over lives in the
/// docker's buffer.
#[derive(Debug, Default)]
pub struct PackageFraming;

impl PackageFraming {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }

    fn encode_frame(kind: FrameKind, serial: u32, index: u16, count: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(sizes::HEADER_SIZE + payload.len());
        frame.extend_from_slice(&sizes::MAGIC);
        frame.push(kind_to_byte(kind));
        frame.push(0);
        frame.extend_from_slice(&serial.to_le_bytes());
        frame.extend_from_slice(&index.to_le_bytes());
        frame.extend_from_slice(&count.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

impl Framing for PackageFraming {
    fn needs_ack(&self) -> bool {
        true
    }

    fn frame(
        &mut self,
        kind: FrameKind,
        serial: u32,
        payload: &[u8],
        max_payload: usize,
    ) -> Vec<Vec<u8>> {
        let max_payload = max_payload.max(1);
        if payload.is_empty() {
            return vec![Self::encode_frame(kind, serial, 0, 1, &[])];
        }

        let count = payload.len().div_ceil(max_payload);
        debug_assert!(count <= usize::from(u16::MAX));
        payload
            .chunks(max_payload)
            .enumerate()
            .map(|(index, chunk)| {
                Self::encode_frame(kind, serial, index as u16, count as u16, chunk)
            })
            .collect()
    }

    fn unframe(&mut self, buf: &mut BytesMut) -> FrameOutcome {
        if buf.is_empty() {
            return FrameOutcome::Insufficient;
        }
        if buf[0] != sizes::MAGIC[0] {
            return FrameOutcome::Malformed(FramingError::BadMagic {
                actual: u16::from_be_bytes([buf[0], buf.get(1).copied().unwrap_or(0)]),
            });
        }
        if buf.len() >= 2 && buf[1] != sizes::MAGIC[1] {
            return FrameOutcome::Malformed(FramingError::BadMagic {
                actual: u16::from_be_bytes([buf[0], buf[1]]),
            });
        }
        if buf.len() < sizes::HEADER_SIZE {
            return FrameOutcome::Insufficient;
        }

        let Some(kind) = kind_from_byte(buf[2]) else {
            return FrameOutcome::Malformed(FramingError::UnknownKind(buf[2]));
        };
        if buf[3] != 0 {
            return FrameOutcome::Malformed(FramingError::ReservedBits(buf[3]));
        }

        let serial = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let index = u16::from_le_bytes([buf[8], buf[9]]);
        let count = u16::from_le_bytes([buf[10], buf[11]]);
        let length = usize::from(u16::from_le_bytes([buf[12], buf[13]]));

        if count == 0 || index >= count {
            return FrameOutcome::Malformed(FramingError::BadFragment { index, count });
        }
        if buf.len() < sizes::HEADER_SIZE + length {
            return FrameOutcome::Insufficient;
        }

        buf.advance(sizes::HEADER_SIZE);
        let payload = buf.split_to(length).to_vec();

        FrameOutcome::Frame(WireFrame {
            kind,
            serial,
            index,
            count,
            payload,
        })
    }

    fn heartbeat_payload(&self) -> Vec<u8> {
        Vec::new()
    }

    fn heartbeat_reply(&self, _payload: &[u8]) -> Option<Vec<u8>> {
        // Keep-alives are answered through the acknowledgment path.
        None
    }
}
