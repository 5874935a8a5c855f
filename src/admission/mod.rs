//! Admission control: slot ledger, wait queue, permits, controller.
//!
//! This module is the heart of the gate. The only shared mutable state in
//! the crate — the ledger/queue pair — lives here behind the controller's
//! lock and is reachable only through the controller's operations.
//!
//! Internal modules:
//! - [`ledger`]: per-user and global active-slot counters;
//! - [`queue`]: arrival-ordered pending requests with oneshot resolvers;
//! - [`permit`]: release-on-drop slot capability;
//! - [`controller`]: the public `acquire`/`cancel`/`clear`/`drain`/`stats`
//!   surface.

mod controller;
mod ledger;
mod permit;
mod queue;

pub use controller::{AdmissionController, GateStats};
pub use permit::SlotPermit;
