//! # Fixed counting window.
//!
//! One `{count, ends_at}` pair per granularity. Windows roll independently:
//! the first call after the deadline resets the counter and re-anchors the
//! deadline at `now + len`.

use std::time::Duration;

use tokio::time::Instant;

/// A fixed window counter for one granularity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    /// Window length.
    len: Duration,
    /// Calls counted in the current window.
    count: u32,
    /// When the current window ends.
    ends_at: Instant,
}

impl Window {
    pub fn new(len: Duration, now: Instant) -> Self {
        Self {
            len,
            count: 0,
            ends_at: now + len,
        }
    }

    /// Resets the window if its deadline has passed. Counters never go
    /// negative; a fresh window starts at zero.
    pub fn roll(&mut self, now: Instant) {
        if now >= self.ends_at {
            self.count = 0;
            self.ends_at = now + self.len;
        }
    }

    /// Calls counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Count as of `now`: zero once the deadline has passed. Read-only — the
    /// stored deadline is not re-anchored, unlike [`Window::roll`].
    pub fn count_at(&self, now: Instant) -> u32 {
        if now >= self.ends_at { 0 } else { self.count }
    }

    /// Counts one call in the current window.
    pub fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Time left until the window rolls over (zero if already past).
    pub fn remaining(&self, now: Instant) -> Duration {
        self.ends_at.saturating_duration_since(now)
    }

    /// When the current window ends.
    pub fn ends_at(&self) -> Instant {
        self.ends_at
    }
}
