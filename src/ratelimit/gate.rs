//! # Rate gate: per-user message-rate windows.
//!
//! Caps how many submissions per user are even *accepted*, independent of
//! slot availability. Runs before the admission controller: a rate-limited
//! request never touches the wait queue and never consumes a slot.
//!
//! ## Windows
//! Three fixed windows per user (minute / hour / day) roll independently.
//! Only the **minute** window decides the outcome; hour and day counters are
//! advisory, exposed through [`RateGate::usage`] for operators. Closing that
//! gap is a deliberate non-change: the origin system tracked but never
//! enforced them.
//!
//! ## Cleanup
//! Entries whose day window ended longer than `retention` ago are pruned,
//! either directly via [`RateGate::prune`] or by the background sweeper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::GateConfig;
use crate::events::{Bus, Event, EventKind};
use crate::UserId;

use super::window::Window;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Accepted; the call was counted in all three windows.
    Allowed,
    /// Rejected; nothing was counted.
    Limited {
        /// Time until the user's minute window rolls over.
        retry_after: Duration,
    },
}

/// Advisory view of a user's current window counters, each paired with its
/// configured ceiling. Only `minute_limit` is enforced by [`RateGate::check`];
/// the hour and day ceilings exist for operators reading this snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateUsage {
    /// Calls accepted in the current minute window.
    pub minute: u32,
    /// The enforced per-minute ceiling.
    pub minute_limit: u32,
    /// Calls accepted in the current hour window.
    pub hour: u32,
    /// The advisory per-hour ceiling.
    pub hour_limit: u32,
    /// Calls accepted in the current day window.
    pub day: u32,
    /// The advisory per-day ceiling.
    pub day_limit: u32,
}

/// Per-user window triple.
#[derive(Debug)]
struct UserWindows {
    minute: Window,
    hour: Window,
    day: Window,
}

impl UserWindows {
    fn new(now: Instant) -> Self {
        Self {
            minute: Window::new(MINUTE, now),
            hour: Window::new(HOUR, now),
            day: Window::new(DAY, now),
        }
    }

    /// Rolls every expired window, each granularity independently.
    fn roll(&mut self, now: Instant) {
        self.minute.roll(now);
        self.hour.roll(now);
        self.day.roll(now);
    }
}

/// Per-user submission-rate limiter.
///
/// Owns its own table; shares no state with the admission controller, only
/// sequencing (the gate runs first).
#[derive(Debug)]
pub struct RateGate {
    per_minute_limit: u32,
    per_hour_limit: u32,
    per_day_limit: u32,
    retention: Duration,
    sweep_interval: Duration,
    bus: Bus,
    table: Mutex<HashMap<UserId, UserWindows>>,
}

impl RateGate {
    /// Creates a rate gate from the gate configuration.
    pub fn new(cfg: &GateConfig, bus: Bus) -> Self {
        Self {
            per_minute_limit: cfg.per_minute_limit,
            per_hour_limit: cfg.per_hour_limit,
            per_day_limit: cfg.per_day_limit,
            retention: cfg.retention,
            sweep_interval: cfg.sweep_interval,
            bus,
            table: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, UserWindows>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks and counts one submission for `user`.
    ///
    /// First sight of a user initializes all three windows. On every call,
    /// expired windows roll first; then the minute counter decides: over the
    /// limit rejects without counting, otherwise all three counters tick.
    pub fn check(&self, user: UserId) -> RateDecision {
        let now = Instant::now();
        let mut table = self.lock();
        let entry = table.entry(user).or_insert_with(|| UserWindows::new(now));
        entry.roll(now);

        if entry.minute.count() + 1 > self.per_minute_limit {
            let retry_after = entry.minute.remaining(now);
            drop(table);
            self.bus.publish(
                Event::new(EventKind::RateLimited)
                    .with_user(user)
                    .with_delay(retry_after),
            );
            return RateDecision::Limited { retry_after };
        }

        entry.minute.increment();
        entry.hour.increment();
        entry.day.increment();
        RateDecision::Allowed
    }

    /// Current counters for `user` as of now. `None` for unknown users.
    ///
    /// Strictly read-only: expired windows read as zero without being
    /// re-anchored, so polling usage cannot keep an idle entry past the
    /// retention horizon.
    pub fn usage(&self, user: UserId) -> Option<RateUsage> {
        let now = Instant::now();
        let table = self.lock();
        let entry = table.get(&user)?;
        Some(RateUsage {
            minute: entry.minute.count_at(now),
            minute_limit: self.per_minute_limit,
            hour: entry.hour.count_at(now),
            hour_limit: self.per_hour_limit,
            day: entry.day.count_at(now),
            day_limit: self.per_day_limit,
        })
    }

    /// Removes entries whose day window ended longer than the retention
    /// horizon ago. Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let retention = self.retention;
        let mut table = self.lock();
        let before = table.len();
        table.retain(|_, entry| now.saturating_duration_since(entry.day.ends_at()) <= retention);
        before - table.len()
    }

    /// Spawns the background sweeper; it prunes every `sweep_interval` until
    /// the token is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = time::sleep(gate.sweep_interval) => {
                        let pruned = gate.prune();
                        if pruned > 0 {
                            gate.bus
                                .publish(Event::new(EventKind::EntriesPruned).with_count(pruned));
                        }
                    }
                }
            }
        });
    }
}
