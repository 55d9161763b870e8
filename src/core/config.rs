//! Transport configuration.
//!
//! One configuration object covers the whole core: freshness windows,
//! retry/backoff policy, reassembly purge, and polling cadence. Defaults are
//! the constants from [`crate::core::constants`].

use std::time::Duration;

use super::constants;

/// Retry backoff schedule for outbound departures.
///
/// One dock uses exactly one policy; policies are never mixed within a dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Constant delay between attempts.
    Fixed(Duration),

    /// Delay grows as `interval * attempt` (attempt 1 waits one interval,
    /// attempt 2 waits two, ...). The crate default.
    Linear(Duration),

    /// Delay doubles-or-more per attempt: `base * multiplier^(attempt-1)`,
    /// capped at `max`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Growth factor per attempt.
        multiplier: u32,
        /// Upper bound on the delay.
        max: Duration,
    },
}

impl BackoffPolicy {
    /// Delay to wait before the given retry attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffPolicy::Fixed(interval) => interval,
            BackoffPolicy::Linear(interval) => interval.saturating_mul(attempt),
            BackoffPolicy::Exponential {
                base,
                multiplier,
                max,
            } => {
                let factor = multiplier.saturating_pow(attempt - 1);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Linear(constants::RETRY_INTERVAL)
    }
}

/// Configuration for a hub/gate pairing.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Freshness window; no receive for this long marks a connection
    /// `Expired`.
    pub expires: Duration,

    /// Purge deadline for incomplete inbound reassembly state.
    pub purge_timeout: Duration,

    /// Maximum retry attempts per departure.
    pub max_retries: u32,

    /// Retry backoff schedule.
    pub backoff: BackoffPolicy,

    /// Total lifetime of a departure from enqueue to forced expiry.
    pub departure_expiry: Duration,

    /// Runner sleep interval when a poll pass found nothing to do.
    pub idle_interval: Duration,

    /// Capacity of the bounded application event queue.
    pub event_capacity: usize,

    /// Largest fragment payload per wire frame.
    pub max_payload: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            expires: constants::EXPIRES,
            purge_timeout: constants::PURGE_TIMEOUT,
            max_retries: constants::MAX_RETRIES,
            backoff: BackoffPolicy::default(),
            departure_expiry: constants::DEPARTURE_EXPIRY,
            idle_interval: constants::IDLE_INTERVAL,
            event_capacity: constants::EVENT_CAPACITY,
            max_payload: constants::MAX_PAYLOAD,
        }
    }
}

impl TransportConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    /// Deadline after which a silent connection is declared dead.
    pub fn death_line(&self) -> Duration {
        self.expires.saturating_mul(constants::DEATH_FACTOR)
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Create a builder seeded with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness window.
    pub fn expires(mut self, expires: Duration) -> Self {
        self.config.expires = expires;
        self
    }

    /// Set the reassembly purge deadline.
    pub fn purge_timeout(mut self, timeout: Duration) -> Self {
        self.config.purge_timeout = timeout;
        self
    }

    /// Set the maximum retry attempts per departure.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the retry backoff schedule.
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.backoff = policy;
        self
    }

    /// Set the total departure lifetime.
    pub fn departure_expiry(mut self, expiry: Duration) -> Self {
        self.config.departure_expiry = expiry;
        self
    }

    /// Set the runner idle sleep interval.
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.config.idle_interval = interval;
        self
    }

    /// Set the event queue capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Set the largest fragment payload per frame.
    pub fn max_payload(mut self, size: usize) -> Self {
        self.config.max_payload = size;
        self
    }

    /// Finish building.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}
