//! # jobgate
//!
//! **jobgate** is an admission-control and request-queueing library for
//! long-running jobs, built for chat-bot style front ends where every
//! submission may fan out into minutes of CPU/IO-heavy work.
//!
//! It decides, under per-user and global concurrency ceilings, which of many
//! simultaneously arriving jobs may start now, which must wait, how waiting
//! requests are ordered and expired, how a user cancels their own waiting
//! work, and how the whole system drains cleanly on shutdown.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   submit(user)                submit(user)               submit(user)
//!        │                           │                          │
//!        ▼                           ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  JobGate (front door)                                             │
//! │  - RateGate (per-user minute/hour/day windows, reject fast)       │
//! │  - AdmissionController (slot ledger + wait queue)                 │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────────────┬──────────────────────────┬─────┘
//!        │ rate-limited             │ slot free                │ no slot
//!        ▼                          ▼                          ▼
//!  Err(RateLimited)            SlotPermit                 wait queue
//!  (never queued)          (release on drop)        ┌──────┴───────────┐
//!                                                   │ promoted   ──► Ok │
//!                                                   │ cancelled  ──► Err│
//!                                                   │ expired    ──► Err│
//!                                                   │ cleared    ──► Err│
//!                                                   └──────────────────┘
//! ```
//!
//! ### Admission rules
//! - A request is admitted immediately while its user is under the per-user
//!   ceiling `P` **and** the global ceiling `G` has room; otherwise it parks
//!   in an arrival-ordered wait queue with a bounded deadline.
//! - Every released slot promotes at most one queued entry: the **first
//!   eligible** one, skipping entries whose owner is at their ceiling. Queue
//!   order is therefore not strict global FIFO — this is a deliberate
//!   anti-monopolization trade-off. A user's own entries never reorder.
//! - Each parked entry resolves exactly once: admitted, cancelled by its
//!   owner, expired at its deadline, or cleared at shutdown.
//!
//! ### Lifecycle
//! ```text
//! JobGate::new(cfg, subscribers)
//!   └─► run_background(token)        (subscriber fan-out + rate sweeper)
//!
//! loop {
//!   ├─► gate.submit(user) ─► Ok(permit) → run job → drop(permit)
//!   │                     └► Err(RateLimited | Cancelled | TimedOut | Shutdown)
//!   └─► gate.cancel_user(user) on user request
//! }
//!
//! wait_for_shutdown_signal().await
//!   └─► gate.shutdown()              (close intake → clear queue → drain)
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobgate::{GateConfig, GateError, JobGate};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = GateConfig::default();
//!     cfg.per_user_limit = 2;
//!     cfg.global_limit = 3;
//!     cfg.queue_timeout = Duration::from_secs(120);
//!
//!     let gate = JobGate::new(cfg, vec![]);
//!
//!     match gate.submit(42).await {
//!         Ok(permit) => {
//!             // ... run the long job ...
//!             permit.release();
//!         }
//!         Err(err @ GateError::RateLimited { .. }) => {
//!             let secs = err.retry_after_secs().unwrap_or(0);
//!             println!("slow down, retry in {secs}s");
//!         }
//!         Err(other) => println!("not admitted: {}", other.as_message()),
//!     }
//!
//!     gate.shutdown().await.expect("drained");
//! }
//! ```
//!
//! ## Outcome taxonomy
//! All four submission outcomes ([`GateError`]) are ordinary control flow —
//! show the user a message, never log them as system failures. Programmer
//! errors (double release) are clamped defensively rather than propagated.

mod admission;
mod config;
mod error;
mod events;
mod ratelimit;
mod runtime;
mod subscribers;

/// User identifier, as carried by the surrounding chat application.
pub type UserId = i64;

// ---- Public re-exports ----

pub use admission::{AdmissionController, GateStats, SlotPermit};
pub use config::GateConfig;
pub use error::{GateError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use ratelimit::{RateDecision, RateGate, RateUsage};
pub use runtime::{wait_for_shutdown_signal, JobGate};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
