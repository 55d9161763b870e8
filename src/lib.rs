//! # Star Trek Protocol
//!
//! A transport core that turns raw, possibly unreliable, possibly
//! connectionless sockets into a uniform abstraction of addressed
//! connections with:
//!
//! - **Lifecycle state**: a timestamp-driven health machine per connection
//!   (`Default -> Preparing -> Ready -> Expired -> Maintaining -> Error`)
//! - **Framed delivery**: wire codecs with fragmentation and reassembly
//! - **Retry and expiry**: priority queues of outbound "departures" with
//!   configurable backoff
//! - **Event dispatch**: lifecycle and data events on a bounded queue
//!
//! Protocol-specific layers (attribute codecs, command sets) ride on top of
//! this core as thin encoders/decoders; the core stays payload-agnostic.
//!
//! ## Feature Flags
//!
//! - `transport` (default): UDP channel, hub ports, gate, and runner
//!
//! Without features the algorithmic core (state machine, ship/dock
//! scheduling, wire codecs) compiles with no async dependencies.
//!
//! ## Modules
//!
//! - [`core`]: addresses, configuration, constants, errors (always included)
//! - [`ship`]: departures, arrivals, and the dock that schedules them
//! - [`docker`]: per-peer workers and wire framing codecs
//! - [`transport`]: connections, the state machine, channels, and the hub
//! - [`gate`]: the application-facing facade (requires `transport`)
//! - [`runner`]: the cooperative poll-or-idle loop (requires `transport`)
//!
//! ## Example Usage
//!
//! ```rust
//! use startrek_protocol::prelude::*;
//! use std::time::Duration;
//!
//! let config = TransportConfig::builder()
//!     .expires(Duration::from_secs(20))
//!     .max_retries(3)
//!     .build();
//!
//! let (gate, events) = Gate::new(config, Protocol::Package);
//! # let _ = (gate, events);
//! ```
//!
//! Driving a gate over UDP:
//!
//! ```no_run
//! use startrek_protocol::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StarError> {
//!     let (mut gate, mut events) = Gate::new(TransportConfig::default(), Protocol::Package);
//!     gate.open("0.0.0.0:19999".parse().unwrap()).await?;
//!     gate.send_data(b"hello", None, "203.0.113.7:19999".parse().unwrap());
//!
//!     let handle = Runner::from_config(gate.config()).spawn(gate);
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             GateEvent::ShipReceived(arrival) => {
//!                 println!("{}: {} bytes", arrival.pair(), arrival.payload().len());
//!             }
//!             GateEvent::ConnectionStateChanged { previous, current, pair } => {
//!                 println!("{pair}: {previous} -> {current}");
//!             }
//!             _ => {}
//!         }
//!     }
//!     handle.stopped().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core types (always included)
pub mod core;

// Ship scheduling (always included)
pub mod ship;

// Per-peer workers and wire codecs (always included)
pub mod docker;

// Connection lifecycle and hub (UDP channel requires `transport`)
pub mod transport;

// Facade (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod gate;

// Cooperative poller (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod runner;

#[cfg(test)]
mod test_util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        AddressPair, BackoffPolicy, ChannelError, FramingError, StarError, TransportConfig,
        TransportConfigBuilder,
    };
    pub use crate::docker::{
        Docker, DockerEvent, FrameKind, FrameOutcome, Framing, Protocol, WireFrame,
    };
    pub use crate::ship::{Arrival, Departure, DepartureKind, DepartureStatus, Dock, Priority};
    pub use crate::transport::{
        Channel, Connection, ConnectionState, Hub, HubReport, StateChange,
    };

    #[cfg(feature = "transport")]
    pub use crate::gate::{Gate, GateEvent, ShipFault};
    #[cfg(feature = "transport")]
    pub use crate::runner::{poll_fn, PollFn, Processor, Runner, RunnerHandle};
    #[cfg(feature = "transport")]
    pub use crate::transport::UdpChannel;
}

// Re-export commonly used items at crate root
pub use crate::core::{AddressPair, StarError, TransportConfig};
pub use crate::docker::Protocol;
pub use crate::ship::{Arrival, Priority};
pub use crate::transport::ConnectionState;

#[cfg(feature = "transport")]
pub use crate::gate::{Gate, GateEvent};
#[cfg(feature = "transport")]
pub use crate::runner::Runner;
