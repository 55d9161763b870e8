//! Transport layer: connection lifecycle over non-blocking channels.
//!
//! - **State machine**: [`ConnectionState`] and its tick-driven transitions
//! - **Connection**: [`Connection`], one peer link with activity timestamps
//! - **Channel**: the [`Channel`] boundary and the UDP implementation
//! - **Hub**: [`Hub`], the connection registry and I/O poll step
//!
//! ```text
//! +-----------------------------------------+
//! |            Gate / Dockers               |
//! +-----------------------------------------+
//! |          Transport layer                |   <- this module
//! |   connections, lifecycle, hub poll      |
//! +-----------------------------------------+
//! |        Channel (UDP, custom)            |
//! +-----------------------------------------+
//! ```

mod channel;
mod connection;
mod hub;
mod state;

pub use channel::Channel;
#[cfg(feature = "transport")]
pub use channel::UdpChannel;
pub use connection::Connection;
pub use hub::{Hub, HubReport};
pub use state::{ConnectionState, StateChange, StateContext, StateMachine};
