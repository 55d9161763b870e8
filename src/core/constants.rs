//! Protocol defaults for the transport core.
//!
//! Every value here can be overridden through [`TransportConfig`];
//! the constants are the documented defaults.
//!
//! [`TransportConfig`]: crate::core::TransportConfig

use std::time::Duration;

// =============================================================================
// FRESHNESS / LIFECYCLE TIMING
// =============================================================================

/// Freshness window: a connection with no receive for this long is `Expired`
/// and needs a heartbeat.
pub const EXPIRES: Duration = Duration::from_secs(28);

/// A connection with no receive for `DEATH_FACTOR * EXPIRES` is declared
/// dead (`Error`).
pub const DEATH_FACTOR: u32 = 2;

/// Incomplete reassembly state older than this is silently purged.
/// Defaults to the freshness window.
pub const PURGE_TIMEOUT: Duration = EXPIRES;

// =============================================================================
// DEPARTURE RETRY
// =============================================================================

/// Maximum retry attempts for a departure before it is reported as failed.
pub const MAX_RETRIES: u32 = 5;

/// Base interval for the retry backoff schedule.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Total lifetime of a departure; past this absolute deadline it expires
/// regardless of remaining retries.
pub const DEPARTURE_EXPIRY: Duration = Duration::from_secs(120);

// =============================================================================
// POLLING
// =============================================================================

/// Runner sleep interval when a `process()` pass found nothing to do.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(128);

/// Capacity of the bounded event queue between a gate and its application.
pub const EVENT_CAPACITY: usize = 256;

// =============================================================================
// WIRE / SOCKETS
// =============================================================================

/// Largest fragment payload handed to the channel in one frame.
/// Sized for untuned MTU paths.
pub const MAX_PAYLOAD: usize = 1200;

/// Receive buffer size for datagram channels.
pub const RECV_BUFFER_SIZE: usize = 65535;
