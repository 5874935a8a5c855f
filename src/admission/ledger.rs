//! # Slot ledger: per-user and global active-slot counters.
//!
//! Pure bookkeeping, no blocking. Mutated only inside the controller's
//! critical section; never exposed for direct external mutation.
//!
//! ## Invariants
//! - `total() == sum of all per-user counts`
//! - absent user key means zero
//! - `discharge` clamps at zero (double release is a caller bug, not a crash)

use std::collections::HashMap;

use crate::UserId;

/// Tracks how many operations are currently executing, per user and globally.
#[derive(Debug, Default)]
pub(crate) struct SlotLedger {
    active: HashMap<UserId, usize>,
    total: usize,
}

impl SlotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active slots held by `user` (zero if unknown).
    pub fn user_active(&self, user: UserId) -> usize {
        self.active.get(&user).copied().unwrap_or(0)
    }

    /// Active slots across all users.
    pub fn total(&self) -> usize {
        self.total
    }

    /// True when `user` is under its ceiling and the global ceiling has room.
    pub fn has_room(&self, user: UserId, per_user: usize, global: usize) -> bool {
        self.user_active(user) < per_user && self.total < global
    }

    /// Records one more active slot for `user`.
    pub fn charge(&mut self, user: UserId) {
        *self.active.entry(user).or_insert(0) += 1;
        self.total += 1;
    }

    /// Releases one active slot for `user`, clamping at zero.
    ///
    /// The key is removed when the count reaches zero so the map only holds
    /// users with live work.
    pub fn discharge(&mut self, user: UserId) {
        if let Some(count) = self.active.get_mut(&user) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&user);
            }
            self.total = self.total.saturating_sub(1);
        }
    }

    /// Snapshot of per-user active counts.
    pub fn snapshot(&self) -> HashMap<UserId, usize> {
        self.active.clone()
    }

    /// Users currently holding at least one slot.
    pub fn users(&self) -> Vec<UserId> {
        self.active.keys().copied().collect()
    }
}
