//! # Slot permit: the release capability handed to admitted callers.
//!
//! A [`SlotPermit`] represents one admitted operation. Dropping it (or
//! calling [`SlotPermit::release`]) frees the slot and triggers the
//! controller's requeue scan, so the slot is returned even if the operation
//! panics or returns early.
//!
//! ## Rules
//! - Release fires **at most once** per permit (atomic flag), no matter how
//!   it is dropped.
//! - Releasing never blocks: the controller's critical section is synchronous
//!   and short.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::UserId;
use crate::admission::controller::Shared;

/// Capability to release one admitted slot.
///
/// Obtained from [`AdmissionController::acquire`](crate::AdmissionController::acquire)
/// (directly or through [`JobGate::submit`](crate::JobGate::submit)).
/// The slot is released on drop; [`SlotPermit::release`] makes the intent
/// explicit at call sites.
pub struct SlotPermit {
    shared: Arc<Shared>,
    user: UserId,
    released: AtomicBool,
}

impl SlotPermit {
    pub(crate) fn new(shared: Arc<Shared>, user: UserId) -> Self {
        Self {
            shared,
            user,
            released: AtomicBool::new(false),
        }
    }

    /// The user this slot belongs to.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Releases the slot now. Equivalent to dropping the permit.
    pub fn release(self) {
        // Drop does the work.
    }

    /// Marks the permit as already settled without touching the ledger.
    ///
    /// Used by the controller when a promotion could not be delivered and the
    /// charge was already undone under the lock; letting this permit drop
    /// normally would discharge the ledger a second time.
    pub(crate) fn defuse(&self) {
        self.released.store(true, Ordering::Release);
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            Shared::release_slot(&self.shared, self.user);
        }
    }
}

impl fmt::Debug for SlotPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPermit")
            .field("user", &self.user)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}
