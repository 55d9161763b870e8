//! Ship layer: units of work moving through the transport.
//!
//! A [`Departure`] is an outbound payload with retry, priority, and expiry
//! metadata; an [`Arrival`] is an inbound message reassembled from fragments.
//! The [`Dock`] holds both, independent of any single connection.

mod arrival;
mod departure;
mod dock;

pub use arrival::Arrival;
pub use departure::{Departure, DepartureKind, DepartureStatus, Priority};
pub use dock::Dock;
