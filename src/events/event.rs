//! # Runtime events emitted by the gate.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Intake events**: rate-gate decisions before anything is queued
//! - **Admission events**: slot grants, queueing, promotions, releases
//! - **Queue resolution events**: cancellation, expiry, forced clearing
//! - **Drain events**: shutdown sequence progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! the user involved, counts, and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobgate::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RequestQueued)
//!     .with_user(42)
//!     .with_count(3)
//!     .with_timeout(Duration::from_secs(300));
//!
//! assert_eq!(ev.kind, EventKind::RequestQueued);
//! assert_eq!(ev.user, Some(42));
//! assert_eq!(ev.count, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::UserId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of gate events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Intake events ===
    /// Submission rejected by the rate gate (never reached the queue).
    ///
    /// Sets:
    /// - `user`: rejected user
    /// - `delay_ms`: time until the minute window rolls over
    /// - `at`, `seq`
    RateLimited,

    // === Admission events ===
    /// A slot was granted immediately, without queueing.
    ///
    /// Sets:
    /// - `user`: slot owner
    /// - `count`: total active slots after the grant
    /// - `at`, `seq`
    SlotAcquired,

    /// No slot was free; the request was parked in the wait queue.
    ///
    /// Sets:
    /// - `user`: request owner
    /// - `count`: queue length after parking
    /// - `timeout_ms`: queue deadline attached to the entry
    /// - `at`, `seq`
    RequestQueued,

    /// A queued request was promoted to an active slot.
    ///
    /// Sets:
    /// - `user`: request owner
    /// - `delay_ms`: how long the request waited in the queue
    /// - `at`, `seq`
    RequestAdmitted,

    /// An active slot was released.
    ///
    /// Sets:
    /// - `user`: former slot owner
    /// - `count`: total active slots after the release
    /// - `at`, `seq`
    SlotReleased,

    // === Queue resolution events ===
    /// Queued requests were cancelled by their owner.
    ///
    /// Sets:
    /// - `user`: owner
    /// - `count`: number of entries removed
    /// - `at`, `seq`
    RequestCancelled,

    /// A queued request waited past its deadline.
    ///
    /// Sets:
    /// - `user`: owner
    /// - `timeout_ms`: the deadline that elapsed
    /// - `at`, `seq`
    RequestExpired,

    /// The whole queue was forcibly cleared (shutdown).
    ///
    /// Sets:
    /// - `count`: number of entries cleared
    /// - `at`, `seq`
    QueueCleared,

    // === Rate table maintenance ===
    /// The sweeper removed stale rate entries.
    ///
    /// Sets:
    /// - `count`: number of entries pruned
    /// - `at`, `seq`
    EntriesPruned,

    // === Drain events ===
    /// Drain requested; intake is closed.
    ///
    /// Sets: `at`, `seq`
    DrainRequested,

    /// All active slots drained within the grace period.
    ///
    /// Sets: `at`, `seq`
    DrainedWithin,

    /// Grace period elapsed with slots still active.
    ///
    /// Sets:
    /// - `count`: slots still active
    /// - `at`, `seq`
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    /// - `at`, `seq`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and drop reason
    /// - `at`, `seq`
    SubscriberOverflow,
}

/// Gate event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// User the event concerns, if applicable.
    pub user: Option<UserId>,
    /// Count whose meaning depends on the kind (active slots, queue length,
    /// entries removed).
    pub count: Option<u32>,
    /// Delay in milliseconds (queue wait, retry hint).
    pub delay_ms: Option<u32>,
    /// Deadline in milliseconds (queue timeout attached to an entry).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (subscriber drops/panics).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            user: None,
            count: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches the user the event concerns.
    #[inline]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Attaches a count (meaning depends on the kind).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a deadline duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}
