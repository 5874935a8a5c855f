//! # JobGate: the front door for job submissions.
//!
//! [`JobGate`] owns the event bus, the rate gate, and the admission
//! controller, and wires them into one intake path. It is constructed
//! explicitly and passed by reference to whatever needs it (handlers, the
//! shutdown sequence, health reporting) — no global singletons.
//!
//! ## Intake path
//! ```text
//! submit(user)
//!     │
//!     ├─ intake closed ────────────────► Err(Shutdown)
//!     ├─ RateGate::check ─ Limited ────► Err(RateLimited)   (never queued)
//!     └─ AdmissionController::acquire ─► Ok(permit) | Err(Cancelled|TimedOut|Shutdown)
//! ```
//!
//! ## Shutdown path
//! ```text
//! shutdown()
//!   ├─► close intake                       (new submissions fail fast)
//!   ├─► publish DrainRequested
//!   ├─► clear_all()                        (queued entries resolve Shutdown)
//!   └─► wait_for_drain(grace)
//!          ├─ drained  → publish DrainedWithin → Ok
//!          └─ timeout  → publish GraceExceeded → Err(GraceExceeded)
//! ```
//! Active work is never cancelled; the drain only waits for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionController, GateStats, SlotPermit};
use crate::config::GateConfig;
use crate::error::{GateError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::ratelimit::{RateDecision, RateGate, RateUsage};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::UserId;

/// Front door combining the rate gate and the admission controller.
///
/// ## Example
/// ```
/// use std::sync::Arc;
/// use jobgate::{GateConfig, JobGate};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = JobGate::new(GateConfig::default(), vec![]);
/// let permit = gate.submit(42).await.unwrap();
/// // ... run the job ...
/// permit.release();
/// # }
/// ```
pub struct JobGate {
    cfg: GateConfig,
    bus: Bus,
    admission: AdmissionController,
    rate: Arc<RateGate>,
    subs: Arc<SubscriberSet>,
    intake_open: AtomicBool,
}

impl JobGate {
    /// Creates a gate with the given configuration and subscribers.
    ///
    /// Subscribers receive every gate event through the
    /// [`SubscriberSet`] once [`JobGate::run_background`] is called.
    pub fn new(cfg: GateConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let admission = AdmissionController::new(&cfg, bus.clone());
        let rate = Arc::new(RateGate::new(&cfg, bus.clone()));
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        Self {
            cfg,
            bus,
            admission,
            rate,
            subs,
            intake_open: AtomicBool::new(true),
        }
    }

    /// Spawns the background pieces: the bus-to-subscribers listener and the
    /// rate-table sweeper. Both stop when `token` is cancelled.
    pub fn run_background(&self, token: CancellationToken) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let listener_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = listener_token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit_arc(Arc::new(ev)),
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });

        self.rate.spawn_sweeper(token);
    }

    /// Submits one job request for `user`.
    ///
    /// Runs the rate gate first — a rate-limited request never reaches the
    /// wait queue and never consumes a slot — then acquires an admission
    /// slot, suspending while none is free.
    pub async fn submit(&self, user: UserId) -> Result<SlotPermit, GateError> {
        if !self.intake_open.load(Ordering::Acquire) {
            return Err(GateError::Shutdown);
        }

        if let RateDecision::Limited { retry_after } = self.rate.check(user) {
            return Err(GateError::RateLimited { retry_after });
        }

        self.admission.acquire(user).await
    }

    /// Cancels every still-queued request of `user`; returns the count.
    pub fn cancel_user(&self, user: UserId) -> usize {
        self.admission.cancel_user(user)
    }

    /// Point-in-time admission snapshot.
    pub fn stats(&self) -> GateStats {
        self.admission.stats()
    }

    /// Advisory rate-window counters for `user`.
    pub fn usage(&self, user: UserId) -> Option<RateUsage> {
        self.rate.usage(user)
    }

    /// The event bus; subscribe here for direct event access.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The underlying admission controller (cheap to clone).
    pub fn controller(&self) -> &AdmissionController {
        &self.admission
    }

    /// Stops accepting new submissions; queued and active work is unaffected.
    pub fn close_intake(&self) {
        self.intake_open.store(false, Ordering::Release);
    }

    /// Runs the drain sequence: close intake, clear the queue, wait for
    /// active slots to finish within the configured grace period.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] when slots are still held at
    /// the end of the grace period; the slots themselves are left running.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.close_intake();
        self.bus.publish(Event::new(EventKind::DrainRequested));
        self.admission.clear_all();

        if self.admission.wait_for_drain(self.cfg.grace).await {
            self.bus.publish(Event::new(EventKind::DrainedWithin));
            Ok(())
        } else {
            let still_active = self.admission.active_users();
            self.bus.publish(
                Event::new(EventKind::GraceExceeded).with_count(self.stats().total_active),
            );
            Err(RuntimeError::GraceExceeded {
                grace: self.cfg.grace,
                still_active,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gate(per_user: usize, global: usize, per_minute: u32, grace: Duration) -> JobGate {
        let cfg = GateConfig {
            per_user_limit: per_user,
            global_limit: global,
            per_minute_limit: per_minute,
            queue_timeout: Duration::from_secs(300),
            grace,
            ..GateConfig::default()
        };
        JobGate::new(cfg, vec![])
    }

    async fn settle(gate: &JobGate, queued: usize) {
        for _ in 0..200 {
            if gate.stats().total_queued == queued {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("queue did not settle at {queued}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_release() {
        let gate = gate(1, 3, 10, Duration::from_secs(30));
        let permit = gate.submit(1).await.unwrap();
        assert_eq!(gate.stats().total_active, 1);
        permit.release();
        assert_eq!(gate.stats().total_active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_request_never_queues() {
        let gate = gate(1, 1, 1, Duration::from_secs(30));
        let _held = gate.submit(1).await.unwrap();

        // The second submission in the same minute is rejected by the rate
        // gate before the admission controller sees it.
        let err = gate.submit(1).await.unwrap_err();
        assert!(matches!(err, GateError::RateLimited { .. }));
        assert!(err.retry_after_secs().unwrap() > 0);
        assert_eq!(gate.stats().total_queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_window_rolls_over_for_submit() {
        let gate = Arc::new(gate(2, 2, 1, Duration::from_secs(30)));
        let _p = gate.submit(1).await.unwrap();
        assert!(matches!(
            gate.submit(1).await.unwrap_err(),
            GateError::RateLimited { .. }
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        let _p2 = gate.submit(1).await.unwrap();
        assert_eq!(gate.usage(1).unwrap().minute, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_queue_and_reports_holders() {
        let gate = Arc::new(gate(1, 1, 10, Duration::from_millis(50)));
        let held = gate.submit(1).await.unwrap();

        let queued = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.submit(2).await })
        };
        settle(&gate, 1).await;

        let err = gate.shutdown().await.unwrap_err();
        assert_eq!(queued.await.unwrap().unwrap_err(), GateError::Shutdown);
        match err {
            RuntimeError::GraceExceeded {
                grace,
                still_active,
            } => {
                assert_eq!(grace, Duration::from_millis(50));
                assert_eq!(still_active, vec![1]);
            }
        }

        // Intake is closed for later submissions.
        assert_eq!(gate.submit(3).await.unwrap_err(), GateError::Shutdown);

        // Once the holder finishes, a second drain completes cleanly.
        drop(held);
        gate.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_when_idle_is_clean() {
        let gate = gate(1, 1, 10, Duration::from_secs(5));
        gate.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events_in_order() {
        let gate = gate(1, 1, 10, Duration::from_secs(30));
        let mut rx = gate.bus().subscribe();

        let permit = gate.submit(1).await.unwrap();
        permit.release();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::SlotAcquired);
        assert_eq!(second.kind, EventKind::SlotReleased);
        assert!(second.seq > first.seq);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_through_facade() {
        let gate = Arc::new(gate(1, 1, 10, Duration::from_secs(30)));
        let _held = gate.submit(1).await.unwrap();

        let queued = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.submit(1).await })
        };
        settle(&gate, 1).await;

        assert_eq!(gate.cancel_user(1), 1);
        assert_eq!(queued.await.unwrap().unwrap_err(), GateError::Cancelled);
        assert_eq!(gate.stats().total_active, 1);
    }
}
