//! Inbound ship: fragment reassembly state and the completed message.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::AddressPair;

/// A completed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub(crate) pair: AddressPair,
    pub(crate) serial: u32,
    pub(crate) payload: Vec<u8>,
    pub(crate) completed: Instant,
}

impl Arrival {
    /// Source/destination pair this arrival came in on.
    pub fn pair(&self) -> AddressPair {
        self.pair
    }

    /// Correlation id assigned by the sender.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// The reassembled payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// When reassembly completed.
    pub fn completed_at(&self) -> Instant {
        self.completed
    }

    /// Consume the arrival, yielding its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// In-progress reassembly of one fragmented message.
///
/// Fragments may arrive in any order; the declared count is fixed by the
/// first fragment seen and later mismatches are rejected.
#[derive(Debug)]
pub(crate) struct Assembly {
    count: u16,
    fragments: BTreeMap<u16, Vec<u8>>,
    updated: Instant,
}

impl Assembly {
    pub(crate) fn new(count: u16, now: Instant) -> Self {
        Self {
            count,
            fragments: BTreeMap::new(),
            updated: now,
        }
    }

    pub(crate) fn declared_count(&self) -> u16 {
        self.count
    }

    /// Store one fragment. Duplicate indexes overwrite silently.
    pub(crate) fn insert(&mut self, index: u16, bytes: Vec<u8>, now: Instant) {
        self.fragments.insert(index, bytes);
        self.updated = now;
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.fragments.len() == usize::from(self.count)
    }

    pub(crate) fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.updated) >= timeout
    }

    /// Concatenate fragments in index order into a finished arrival.
    pub(crate) fn assemble(self, pair: AddressPair, serial: u32, now: Instant) -> Arrival {
        let mut payload = Vec::with_capacity(self.fragments.values().map(Vec::len).sum());
        for bytes in self.fragments.into_values() {
            payload.extend_from_slice(&bytes);
        }
        Arrival {
            pair,
            serial,
            payload,
            completed: now,
        }
    }
}
