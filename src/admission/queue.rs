//! # Wait queue: pending admission requests in arrival order.
//!
//! Each entry owns the sending half of a oneshot channel; the parked caller
//! holds the receiving half. Whoever removes an entry from the queue decides
//! its fate exactly once — sending consumes the sender, so double resolution
//! is impossible by construction.
//!
//! ## Lifecycle of an entry
//! ```text
//! push ──► queued ──┬─► take_first_eligible ──► Admitted(permit)
//!                   ├─► remove_user          ──► Cancelled
//!                   ├─► remove(id)           ──► (expiry: caller reports timeout)
//!                   ├─► remove_expired       ──► Expired (abandoned callers)
//!                   └─► drain_all            ──► Shutdown
//! ```
//!
//! ## Rules
//! - Arrival order is preserved; scans walk head to tail.
//! - `take_first_eligible` may skip entries whose owner is at their per-user
//!   ceiling; per-user relative order is still FIFO.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::UserId;
use crate::admission::permit::SlotPermit;

/// Terminal resolution delivered to a parked caller.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Promoted to an active slot.
    Admitted(SlotPermit),
    /// Removed by the owner's cancel request.
    Cancelled,
    /// Removed by a scan because the deadline passed. A live parked caller
    /// normally beats this with its own deadline timer; this arm covers
    /// entries whose caller abandoned the wait.
    Expired {
        /// How long the entry sat in the queue (its configured timeout).
        waited: Duration,
    },
    /// Removed because the queue was forcibly cleared.
    Shutdown,
}

/// A pending admission request.
#[derive(Debug)]
pub(crate) struct Waiter {
    /// Opaque unique id (monotonic).
    pub id: u64,
    /// Owning user.
    pub user: UserId,
    /// When the request was parked.
    pub queued_at: Instant,
    /// When the request expires.
    pub deadline: Instant,
    /// Resolver; consumed by whichever transition fires first.
    pub tx: oneshot::Sender<Resolution>,
}

/// Ordered collection of pending admission requests.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    entries: VecDeque<Waiter>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends an entry at the tail (arrival order).
    pub fn push(&mut self, waiter: Waiter) {
        self.entries.push_back(waiter);
    }

    /// Removes the entry with the given id, if still queued.
    ///
    /// Returns `None` when the entry already left the queue through another
    /// transition; the caller must treat that as losing the race.
    pub fn remove(&mut self, id: u64) -> Option<Waiter> {
        let pos = self.entries.iter().position(|w| w.id == id)?;
        self.entries.remove(pos)
    }

    /// Removes every entry belonging to `user`, preserving relative order.
    pub fn remove_user(&mut self, user: UserId) -> Vec<Waiter> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for waiter in self.entries.drain(..) {
            if waiter.user == user {
                removed.push(waiter);
            } else {
                kept.push_back(waiter);
            }
        }
        self.entries = kept;
        removed
    }

    /// Removes all entries, preserving order.
    pub fn drain_all(&mut self) -> Vec<Waiter> {
        self.entries.drain(..).collect()
    }

    /// Removes every entry whose deadline is at or before `now`, preserving
    /// the order of the survivors.
    pub fn remove_expired(&mut self, now: Instant) -> Vec<Waiter> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for waiter in self.entries.drain(..) {
            if waiter.deadline <= now {
                expired.push(waiter);
            } else {
                kept.push_back(waiter);
            }
        }
        self.entries = kept;
        expired
    }

    /// Removes the first entry (head to tail) whose owner satisfies
    /// `eligible`. Later entries from other users may overtake a head entry
    /// whose owner is at their ceiling; this is the anti-monopolization
    /// trade-off, not strict global FIFO.
    pub fn take_first_eligible(&mut self, eligible: impl Fn(UserId) -> bool) -> Option<Waiter> {
        let pos = self.entries.iter().position(|w| eligible(w.user))?;
        self.entries.remove(pos)
    }
}
