//! Plain wire format: one datagram per message, fire-and-forget.
//!
//! No header, no fragmentation, no acknowledgments. Keep-alives are the
//! literal datagrams `PING` and `PONG`; a received `PING` is answered with
//! `PONG`, which refreshes the peer's view of this side without looping.

use bytes::BytesMut;

use super::framing::{FrameKind, FrameOutcome, Framing, WireFrame};

const PING: &[u8] = b"PING";
const PONG: &[u8] = b"PONG";

/// The plain codec.
#[derive(Debug, Default)]
pub struct PlainFraming;

impl PlainFraming {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Framing for PlainFraming {
    fn needs_ack(&self) -> bool {
        false
    }

    fn frame(
        &mut self,
        _kind: FrameKind,
        _serial: u32,
        payload: &[u8],
        _max_payload: usize,
    ) -> Vec<Vec<u8>> {
        vec![payload.to_vec()]
    }

    fn unframe(&mut self, buf: &mut BytesMut) -> FrameOutcome {
        if buf.is_empty() {
            return FrameOutcome::Insufficient;
        }
        let payload = buf.split().to_vec();
        let kind = if payload == PING || payload == PONG {
            FrameKind::Heartbeat
        } else {
            FrameKind::Data
        };
        FrameOutcome::Frame(WireFrame {
            kind,
            serial: 0,
            index: 0,
            count: 1,
            payload,
        })
    }

    fn heartbeat_payload(&self) -> Vec<u8> {
        PING.to_vec()
    }

    fn heartbeat_reply(&self, payload: &[u8]) -> Option<Vec<u8>> {
        (payload == PING).then(|| PONG.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_is_one_frame() {
        let mut codec = PlainFraming::new();
        let mut buf = BytesMut::from(&b"hello"[..]);

        match codec.unframe(&mut buf) {
            FrameOutcome::Frame(frame) => {
                assert_eq!(frame.kind, FrameKind::Data);
                assert_eq!(frame.count, 1);
                assert_eq!(frame.payload, b"hello");
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(buf.is_empty());
        assert!(matches!(codec.unframe(&mut buf), FrameOutcome::Insufficient));
    }

    #[test]
    fn test_keepalives_classified() {
        let mut codec = PlainFraming::new();

        let mut buf = BytesMut::from(&b"PING"[..]);
        match codec.unframe(&mut buf) {
            FrameOutcome::Frame(frame) => assert_eq!(frame.kind, FrameKind::Heartbeat),
            other => panic!("expected frame, got {other:?}"),
        }

        let mut buf = BytesMut::from(&b"PONG"[..]);
        match codec.unframe(&mut buf) {
            FrameOutcome::Frame(frame) => assert_eq!(frame.kind, FrameKind::Heartbeat),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_ping_answered_pong_not_looped() {
        let codec = PlainFraming::new();
        assert_eq!(codec.heartbeat_reply(PING), Some(PONG.to_vec()));
        // PONG must not trigger another reply.
        assert_eq!(codec.heartbeat_reply(PONG), None);
    }

    #[test]
    fn test_frame_passes_payload_through() {
        let mut codec = PlainFraming::new();
        let frames = codec.frame(FrameKind::Data, 0, b"hello", 4);
        // No fragmentation for the plain format.
        assert_eq!(frames, vec![b"hello".to_vec()]);
    }
}
