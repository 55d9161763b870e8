//! Error types for the transport core.

use thiserror::Error;

/// Errors surfaced by a socket channel.
///
/// `WouldBlock` is not a failure: it is the normal result of polling a
/// non-blocking socket that has nothing to do, and callers treat it as
/// "try again next tick".
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The operation would block; retry on a later tick.
    #[error("operation would block")]
    WouldBlock,

    /// The channel was closed and can no longer be used.
    #[error("channel closed")]
    Closed,

    /// Fatal I/O error from the underlying socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Whether this condition is transient (retry-eligible) rather than fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::WouldBlock)
    }
}

/// Wire-framing violations detected while decoding inbound bytes.
///
/// These never affect connection state; the offending bytes are discarded
/// and the worker keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Leading bytes did not carry the expected magic.
    #[error("bad frame magic: {actual:#06x}")]
    BadMagic {
        /// The two bytes found where the magic was expected.
        actual: u16,
    },

    /// Unrecognized frame kind byte.
    #[error("unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    /// Reserved header bits were set.
    #[error("reserved header bits set: {0:#04x}")]
    ReservedBits(u8),

    /// Fragment index/count combination is impossible.
    #[error("invalid fragment {index} of {count}")]
    BadFragment {
        /// Declared fragment index.
        index: u16,
        /// Declared fragment count.
        count: u16,
    },
}

/// Top-level errors of the transport core.
#[derive(Debug, Error)]
pub enum StarError {
    /// Socket channel error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Wire framing error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// No channel is available for the requested local address and the
    /// build cannot open one lazily.
    #[error("no channel for local address")]
    NoChannel,

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
