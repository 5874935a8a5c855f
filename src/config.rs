//! # Gate configuration.
//!
//! [`GateConfig`] defines the behavior of the whole gate: concurrency
//! ceilings, queue wait deadline, per-user message-rate limits, rate-table
//! retention, event bus capacity, and the drain grace period.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use jobgate::GateConfig;
//!
//! let mut cfg = GateConfig::default();
//! cfg.per_user_limit = 2;
//! cfg.global_limit = 3;
//! cfg.queue_timeout = Duration::from_secs(120);
//!
//! assert_eq!(cfg.global_limit, 3);
//! ```

use std::time::Duration;

/// Global configuration for the gate.
///
/// Controls slot ceilings, queue wait deadline, message-rate windows,
/// rate-table garbage collection, and graceful-drain behavior.
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Maximum concurrently active slots per user (`P`).
    ///
    /// `0` means no request is ever admitted; callers queue until expiry.
    pub per_user_limit: usize,
    /// Maximum concurrently active slots across all users (`G`).
    ///
    /// `0` means no request is ever admitted; callers queue until expiry.
    pub global_limit: usize,
    /// How long a request may wait in the queue before resolving as timed out.
    pub queue_timeout: Duration,

    /// Accepted submissions per user per minute. This is the only enforced
    /// rate window; see [`RateGate`](crate::RateGate).
    pub per_minute_limit: u32,
    /// Advisory per-hour ceiling; never rejects, reported next to the hour
    /// counter in [`RateUsage`](crate::RateUsage).
    pub per_hour_limit: u32,
    /// Advisory per-day ceiling; never rejects, reported next to the day
    /// counter in [`RateUsage`](crate::RateUsage).
    pub per_day_limit: u32,
    /// How long an idle user's rate entry outlives its day window before the
    /// sweeper removes it.
    pub retention: Duration,
    /// Interval between rate-table sweeps.
    pub sweep_interval: Duration,

    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
    /// Maximum time [`JobGate::shutdown`](crate::JobGate::shutdown) waits for
    /// active slots to drain before reporting the drain as forced.
    pub grace: Duration,
}

impl Default for GateConfig {
    /// Provides a default configuration:
    /// - `per_user_limit = 1`
    /// - `global_limit = 3`
    /// - `queue_timeout = 5min`
    /// - `per_minute_limit = 10`, `per_hour_limit = 120`, `per_day_limit = 1000`
    /// - `retention = 24h`, `sweep_interval = 1h`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            per_user_limit: 1,
            global_limit: 3,
            queue_timeout: Duration::from_secs(300),
            per_minute_limit: 10,
            per_hour_limit: 120,
            per_day_limit: 1000,
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
        }
    }
}
