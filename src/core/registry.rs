//! Address-keyed arena registry.
//!
//! Both the hub (connections) and the gate (dockers) need the same shape of
//! store: a dense slot arena plus an index from [`AddressPair`] to slot.
//! Removal tombstones the slot and recycles it through a free list, so slot
//! positions stay stable for round-robin iteration.

use rustc_hash::FxHashMap;

use super::address::AddressPair;

/// Dense store of `T` indexed by [`AddressPair`].
#[derive(Debug)]
pub(crate) struct Registry<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    index: FxHashMap<AddressPair, usize>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of slots, live or tombstoned. The bound for slot iteration.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn contains(&self, pair: &AddressPair) -> bool {
        self.index.contains_key(pair)
    }

    /// Insert a value for a pair, returning its slot.
    ///
    /// The pair must not already be present; the caller upholds the
    /// one-entry-per-pair invariant by checking `contains` first.
    pub(crate) fn insert(&mut self, pair: AddressPair, value: T) -> usize {
        debug_assert!(!self.index.contains_key(&pair));
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(value);
                slot
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        self.index.insert(pair, slot);
        slot
    }

    pub(crate) fn get(&self, pair: &AddressPair) -> Option<&T> {
        self.index.get(pair).and_then(|&slot| self.slots[slot].as_ref())
    }

    pub(crate) fn get_mut(&mut self, pair: &AddressPair) -> Option<&mut T> {
        let slot = *self.index.get(pair)?;
        self.slots[slot].as_mut()
    }

    /// Access a value by slot position; `None` for tombstoned slots.
    pub(crate) fn slot_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).and_then(|entry| entry.as_mut())
    }

    /// Remove the entry for a pair, tombstoning its slot.
    pub(crate) fn remove(&mut self, pair: &AddressPair) -> Option<T> {
        let slot = self.index.remove(pair)?;
        let value = self.slots[slot].take();
        self.free.push(slot);
        value
    }

    /// Registered pairs, collected so callers can mutate while walking.
    pub(crate) fn pairs(&self) -> Vec<AddressPair> {
        self.index.keys().copied().collect()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn pair(port: u16) -> AddressPair {
        let remote: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        AddressPair::new(remote, None)
    }

    #[test]
    fn test_insert_get_remove() {
        let mut registry: Registry<u32> = Registry::new();
        assert!(registry.is_empty());

        registry.insert(pair(1), 10);
        registry.insert(pair(2), 20);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&pair(1)), Some(&10));
        assert_eq!(registry.get(&pair(3)), None);

        assert_eq!(registry.remove(&pair(1)), Some(10));
        assert_eq!(registry.remove(&pair(1)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_slot_reuse_after_tombstone() {
        let mut registry: Registry<u32> = Registry::new();
        let first = registry.insert(pair(1), 10);
        registry.insert(pair(2), 20);

        registry.remove(&pair(1));
        assert_eq!(registry.slot_count(), 2);
        assert!(registry.slot_mut(first).is_none());

        // The tombstoned slot is recycled, not appended.
        let reused = registry.insert(pair(3), 30);
        assert_eq!(reused, first);
        assert_eq!(registry.slot_count(), 2);
        assert_eq!(registry.get(&pair(3)), Some(&30));
    }

    #[test]
    fn test_pairs_skip_tombstones() {
        let mut registry: Registry<u32> = Registry::new();
        registry.insert(pair(1), 10);
        registry.insert(pair(2), 20);
        registry.remove(&pair(1));

        assert_eq!(registry.pairs(), vec![pair(2)]);
        assert!(!registry.is_empty());
    }
}
