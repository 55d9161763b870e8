//! The dock: pending departures and in-progress arrivals for all peers.
//!
//! The dock is independent of any connection. Dockers pull ready departures
//! filtered to their own address pair and feed received fragments back in.
//! All scheduling is wall-clock compared against an injected `now`; the dock
//! never sleeps or sets timers.

use std::mem;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::core::{AddressPair, BackoffPolicy, TransportConfig};

use super::arrival::{Arrival, Assembly};
use super::departure::{Departure, DepartureStatus};

/// Queue of pending [`Departure`]s plus the reassembly cache of in-progress
/// [`Arrival`]s.
#[derive(Debug)]
pub struct Dock {
    backoff: BackoffPolicy,
    max_retries: u32,
    purge_timeout: Duration,
    departure_expiry: Duration,
    /// Sorted by `(priority, seq)`: priority first, FIFO within a priority.
    queue: Vec<Departure>,
    next_seq: u64,
    assemblies: FxHashMap<(AddressPair, u32), Assembly>,
    failed: Vec<Departure>,
    purged_total: u64,
}

impl Dock {
    /// Create a dock with the given scheduling policy.
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            backoff: config.backoff,
            max_retries: config.max_retries,
            purge_timeout: config.purge_timeout,
            departure_expiry: config.departure_expiry,
            queue: Vec::new(),
            next_seq: 0,
            assemblies: FxHashMap::default(),
            failed: Vec::new(),
            purged_total: 0,
        }
    }

    /// Number of departures waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of partially reassembled arrivals in the cache.
    pub fn assembling_count(&self) -> usize {
        self.assemblies.len()
    }

    /// Total arrivals dropped by the purge sweep since creation.
    pub fn purged_total(&self) -> u64 {
        self.purged_total
    }

    // -------------------------------------------------------------------------
    // departures
    // -------------------------------------------------------------------------

    /// Enqueue a new departure, stamping its scheduling deadlines.
    pub fn append(&mut self, mut departure: Departure, now: Instant) {
        departure.seq = self.next_seq;
        self.next_seq += 1;
        departure.next_attempt = now;
        departure.expires_at = now + self.departure_expiry;
        self.insert_sorted(departure);
    }

    /// Pop the highest-priority departure for `pair` that is due for a write
    /// attempt. Expired departures encountered on the way are diverted to the
    /// failed list instead of being returned.
    pub fn next_departure(&mut self, now: Instant, pair: &AddressPair) -> Option<Departure> {
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].pair != *pair {
                i += 1;
                continue;
            }
            if self.queue[i].is_expired(now) {
                let mut expired = self.queue.remove(i);
                expired.status = DepartureStatus::Expired;
                self.failed.push(expired);
                continue;
            }
            if self.queue[i].is_ready(now) {
                return Some(self.queue.remove(i));
            }
            i += 1;
        }
        None
    }

    /// Return a departure whose write attempt failed. It is rescheduled per
    /// the backoff policy, or moved to the failed list once the retry budget
    /// is spent. The status is preserved: a departure that was written once
    /// stays `Sent` and remains uncancellable.
    pub fn push_retry(&mut self, departure: Departure, now: Instant) {
        let status = departure.status;
        self.reschedule(departure, now, status);
    }

    /// Return a departure that was written but awaits an acknowledgment.
    /// It stays queued for retransmission on the same backoff schedule until
    /// acknowledged or exhausted.
    pub fn push_pending_ack(&mut self, departure: Departure, now: Instant) {
        self.reschedule(departure, now, DepartureStatus::Sent);
    }

    fn reschedule(&mut self, mut departure: Departure, now: Instant, status: DepartureStatus) {
        departure.retries += 1;
        if departure.retries > self.max_retries {
            departure.status = DepartureStatus::Failed;
            self.failed.push(departure);
            return;
        }
        departure.status = status;
        departure.next_attempt = now + self.backoff.delay(departure.retries);
        self.insert_sorted(departure);
    }

    /// Match an inbound acknowledgment to its pending departure.
    pub fn acknowledge(&mut self, pair: &AddressPair, serial: u32) -> Option<Departure> {
        let position = self
            .queue
            .iter()
            .position(|d| d.need_ack && d.pair == *pair && d.serial == serial)?;
        let mut acked = self.queue.remove(position);
        acked.status = DepartureStatus::Acked;
        Some(acked)
    }

    /// Cancel a departure by identity. Only departures that were never
    /// written can be cancelled.
    pub fn cancel(&mut self, pair: &AddressPair, serial: u32) -> Option<Departure> {
        let position = self.queue.iter().position(|d| {
            d.pair == *pair && d.serial == serial && d.status == DepartureStatus::New
        })?;
        Some(self.queue.remove(position))
    }

    /// Fail every pending departure for a pair (connection teardown).
    pub fn fail_pair(&mut self, pair: &AddressPair) {
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].pair == *pair {
                let mut dead = self.queue.remove(i);
                dead.status = DepartureStatus::Failed;
                self.failed.push(dead);
            } else {
                i += 1;
            }
        }
    }

    fn insert_sorted(&mut self, departure: Departure) {
        let key = (departure.priority, departure.seq);
        let position = self
            .queue
            .partition_point(|d| (d.priority, d.seq) <= key);
        self.queue.insert(position, departure);
    }

    // -------------------------------------------------------------------------
    // arrivals
    // -------------------------------------------------------------------------

    /// Feed one decoded fragment into the reassembly cache.
    ///
    /// Returns the completed [`Arrival`] once all declared fragments are
    /// present; fragments may arrive in any order. A fragment whose declared
    /// count disagrees with the cached assembly is dropped.
    pub fn append_fragment(
        &mut self,
        pair: AddressPair,
        serial: u32,
        index: u16,
        count: u16,
        bytes: Vec<u8>,
        now: Instant,
    ) -> Option<Arrival> {
        if count <= 1 {
            return Some(Arrival {
                pair,
                serial,
                payload: bytes,
                completed: now,
            });
        }

        let key = (pair, serial);
        let assembly = self
            .assemblies
            .entry(key)
            .or_insert_with(|| Assembly::new(count, now));
        if assembly.declared_count() != count {
            warn!(%pair, serial, "fragment count mismatch, dropping fragment");
            return None;
        }
        assembly.insert(index, bytes, now);

        if assembly.is_complete() {
            let assembly = self.assemblies.remove(&key)?;
            return Some(assembly.assemble(pair, serial, now));
        }
        None
    }

    // -------------------------------------------------------------------------
    // sweep
    // -------------------------------------------------------------------------

    /// One maintenance pass: purge stale assemblies, expire overdue
    /// departures, and hand back everything that failed since the last sweep.
    pub fn sweep(&mut self, now: Instant) -> Vec<Departure> {
        let timeout = self.purge_timeout;
        let before = self.assemblies.len();
        self.assemblies.retain(|(pair, serial), assembly| {
            let stale = assembly.is_stale(now, timeout);
            if stale {
                warn!(%pair, serial = *serial, "purging stale arrival");
            }
            !stale
        });
        self.purged_total += (before - self.assemblies.len()) as u64;

        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].is_expired(now) {
                let mut expired = self.queue.remove(i);
                expired.status = DepartureStatus::Expired;
                self.failed.push(expired);
            } else {
                i += 1;
            }
        }

        mem::take(&mut self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::departure::{DepartureKind, Priority};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn pair(port: u16) -> AddressPair {
        let remote: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        AddressPair::new(remote, None)
    }

    fn config() -> TransportConfig {
        TransportConfig::builder()
            .max_retries(2)
            .backoff(BackoffPolicy::Fixed(Duration::from_millis(100)))
            .departure_expiry(Duration::from_secs(60))
            .purge_timeout(Duration::from_secs(10))
            .build()
    }

    fn departure(pair: AddressPair, serial: u32, priority: Priority) -> Departure {
        Departure::new(pair, serial, DepartureKind::Data, priority)
            .with_payload(vec![serial as u8])
    }

    #[test]
    fn test_priority_before_fifo() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        dock.append(departure(peer, 1, Priority::Normal), now);
        dock.append(departure(peer, 2, Priority::Critical), now);
        dock.append(departure(peer, 3, Priority::Normal), now);

        assert_eq!(dock.next_departure(now, &peer).unwrap().serial(), 2);
        // Equal priority drains in enqueue order.
        assert_eq!(dock.next_departure(now, &peer).unwrap().serial(), 1);
        assert_eq!(dock.next_departure(now, &peer).unwrap().serial(), 3);
        assert!(dock.next_departure(now, &peer).is_none());
    }

    #[test]
    fn test_filtered_by_pair() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();

        dock.append(departure(pair(1), 1, Priority::Normal), now);
        dock.append(departure(pair(2), 2, Priority::Critical), now);

        assert_eq!(dock.next_departure(now, &pair(1)).unwrap().serial(), 1);
        assert!(dock.next_departure(now, &pair(1)).is_none());
        assert_eq!(dock.pending_count(), 1);
    }

    #[test]
    fn test_retry_bound() {
        let mut dock = Dock::new(&config());
        let mut now = Instant::now();
        let peer = pair(1);

        dock.append(departure(peer, 1, Priority::Normal), now);

        // A departure that always fails to write is attempted at most
        // max_retries + 1 times.
        let mut attempts = 0;
        loop {
            match dock.next_departure(now, &peer) {
                Some(d) => {
                    attempts += 1;
                    dock.push_retry(d, now);
                    now += Duration::from_millis(150);
                }
                None => {
                    if dock.pending_count() == 0 {
                        break;
                    }
                    now += Duration::from_millis(150);
                }
            }
        }
        assert_eq!(attempts, 3);

        // Reported as failed exactly once.
        let failed = dock.sweep(now);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status(), DepartureStatus::Failed);
        assert!(dock.sweep(now).is_empty());
    }

    #[test]
    fn test_backoff_delays_next_attempt() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        dock.append(departure(peer, 1, Priority::Normal), now);
        let d = dock.next_departure(now, &peer).unwrap();
        dock.push_retry(d, now);

        // Not due again until the backoff interval elapses.
        assert!(dock.next_departure(now, &peer).is_none());
        assert!(dock
            .next_departure(now + Duration::from_millis(100), &peer)
            .is_some());
    }

    #[test]
    fn test_acknowledge_matches_pending() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        let d = departure(peer, 42, Priority::Normal).with_ack_required(true);
        dock.append(d, now);

        let d = dock.next_departure(now, &peer).unwrap();
        dock.push_pending_ack(d, now);

        assert!(dock.acknowledge(&peer, 41).is_none());
        let acked = dock.acknowledge(&peer, 42).unwrap();
        assert_eq!(acked.status(), DepartureStatus::Acked);
        assert_eq!(dock.pending_count(), 0);

        // Already gone.
        assert!(dock.acknowledge(&peer, 42).is_none());
    }

    #[test]
    fn test_cancel_only_before_write() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        dock.append(departure(peer, 1, Priority::Normal), now);
        assert!(dock.cancel(&peer, 1).is_some());
        assert!(dock.cancel(&peer, 1).is_none());

        let d = departure(peer, 2, Priority::Normal).with_ack_required(true);
        dock.append(d, now);
        let d = dock.next_departure(now, &peer).unwrap();
        dock.push_pending_ack(d, now);

        // Written once; cancellation is refused.
        assert!(dock.cancel(&peer, 2).is_none());
    }

    #[test]
    fn test_expired_departure_never_returned() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        dock.append(departure(peer, 1, Priority::Normal), now);

        let later = now + Duration::from_secs(61);
        assert!(dock.next_departure(later, &peer).is_none());

        let failed = dock.sweep(later);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status(), DepartureStatus::Expired);
    }

    #[test]
    fn test_fragments_in_order() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        assert!(dock.append_fragment(peer, 1, 0, 3, b"he".to_vec(), now).is_none());
        assert!(dock.append_fragment(peer, 1, 1, 3, b"ll".to_vec(), now).is_none());
        let arrival = dock.append_fragment(peer, 1, 2, 3, b"o".to_vec(), now).unwrap();
        assert_eq!(arrival.payload(), b"hello");
        assert_eq!(dock.assembling_count(), 0);
    }

    #[test]
    fn test_fragments_out_of_order() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        assert!(dock.append_fragment(peer, 1, 2, 3, b"o".to_vec(), now).is_none());
        assert!(dock.append_fragment(peer, 1, 0, 3, b"he".to_vec(), now).is_none());
        let arrival = dock.append_fragment(peer, 1, 1, 3, b"ll".to_vec(), now).unwrap();
        assert_eq!(arrival.payload(), b"hello");
    }

    #[test]
    fn test_single_fragment_completes_immediately() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();

        let arrival = dock
            .append_fragment(pair(1), 9, 0, 1, b"ping".to_vec(), now)
            .unwrap();
        assert_eq!(arrival.serial(), 9);
        assert_eq!(arrival.payload(), b"ping");
    }

    #[test]
    fn test_purge_drops_stale_assembly_for_good() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        assert!(dock.append_fragment(peer, 1, 0, 2, b"ab".to_vec(), now).is_none());
        assert_eq!(dock.assembling_count(), 1);

        let later = now + Duration::from_secs(11);
        dock.sweep(later);
        assert_eq!(dock.assembling_count(), 0);
        assert_eq!(dock.purged_total(), 1);

        // The missing fragment arriving after the purge starts a fresh,
        // incomplete assembly; the original message never completes.
        assert!(dock.append_fragment(peer, 1, 1, 2, b"cd".to_vec(), later).is_none());
        assert_eq!(dock.assembling_count(), 1);
    }

    #[test]
    fn test_fragment_count_mismatch_dropped() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();
        let peer = pair(1);

        assert!(dock.append_fragment(peer, 1, 0, 3, b"a".to_vec(), now).is_none());
        // Same serial, different declared count: rejected.
        assert!(dock.append_fragment(peer, 1, 1, 2, b"b".to_vec(), now).is_none());
        assert!(dock.append_fragment(peer, 1, 1, 3, b"b".to_vec(), now).is_none());
        let arrival = dock.append_fragment(peer, 1, 2, 3, b"c".to_vec(), now).unwrap();
        assert_eq!(arrival.payload(), b"abc");
    }

    #[test]
    fn test_fail_pair_reports_once() {
        let mut dock = Dock::new(&config());
        let now = Instant::now();

        dock.append(departure(pair(1), 1, Priority::Normal), now);
        dock.append(departure(pair(1), 2, Priority::Normal), now);
        dock.append(departure(pair(2), 3, Priority::Normal), now);

        dock.fail_pair(&pair(1));
        assert_eq!(dock.pending_count(), 1);

        let failed = dock.sweep(now);
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|d| d.status() == DepartureStatus::Failed));
    }
}
