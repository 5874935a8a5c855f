//! Gate events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the admission controller, rate
//! gate, and drain sequence.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `AdmissionController`, `RateGate`, `JobGate` (drain),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener spawned by `JobGate::run_background()`
//!   (fans out to `SubscriberSet`), plus any direct `Bus::subscribe` caller.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
