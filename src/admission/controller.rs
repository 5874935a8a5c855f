//! # Admission controller: slot ledger + wait queue behind one lock.
//!
//! The controller gates concurrent long-running operations by a per-user
//! ceiling `P` and a global ceiling `G`, parking excess demand in an
//! arrival-ordered wait queue with a bounded deadline.
//!
//! ## Architecture
//! ```text
//! acquire(user)
//!     │
//!     ├─ room under P and G ──► charge ledger ──► SlotPermit (immediate)
//!     │
//!     └─ no room ──► park entry {id, user, deadline, oneshot}
//!                        │
//!          ┌─────────────┼──────────────┬───────────────┐
//!          ▼             ▼              ▼               ▼
//!      promoted      cancel_user    deadline hit     clear_all
//!      (release      (owner only)   (entry removes   (shutdown)
//!       scan)                        itself)
//!          │             │              │               │
//!          ▼             ▼              ▼               ▼
//!      Ok(permit)   Err(Cancelled)  Err(TimedOut)  Err(Shutdown)
//! ```
//!
//! ## Rules
//! - Ledger and queue are mutated only under one mutex; the lock is never
//!   held across an await point.
//! - Each parked entry resolves **exactly once**: the oneshot sender is
//!   consumed by whichever transition removes the entry from the queue.
//! - One released slot promotes at most one queued entry (first eligible
//!   from the head; entries whose owner is at their ceiling are skipped).
//! - Expiry races promotion safely: the deadline timer removes the entry
//!   under the lock, and if it is already gone the caller awaits the real
//!   resolution instead.
//! - An abandoned acquire future loses its deadline timer with it; requeue
//!   scans and snapshots sweep entries past their deadline out of the queue
//!   so they cannot linger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant};

use crate::admission::ledger::SlotLedger;
use crate::admission::permit::SlotPermit;
use crate::admission::queue::{Resolution, WaitQueue, Waiter};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::events::{Bus, Event, EventKind};
use crate::UserId;

/// Point-in-time snapshot of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStats {
    /// Slots currently executing across all users.
    pub total_active: usize,
    /// Requests currently parked in the wait queue.
    pub total_queued: usize,
    /// Active slot count per user (users with zero slots are absent).
    pub active_by_user: HashMap<UserId, usize>,
}

/// Ledger + queue guarded by one mutex.
#[derive(Debug, Default)]
struct State {
    ledger: SlotLedger,
    queue: WaitQueue,
}

/// Shared controller internals; permits hold an `Arc` to this.
#[derive(Debug)]
pub(crate) struct Shared {
    per_user: usize,
    global: usize,
    queue_timeout: Duration,
    bus: Bus,
    state: Mutex<State>,
    /// Current total of active slots, for drain waiters.
    active_tx: watch::Sender<usize>,
    next_id: AtomicU64,
}

impl Shared {
    /// Locks the state, recovering from poisoning: a panicking caller must
    /// not take the whole admission subsystem down with it.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frees one slot for `user` and runs the requeue scan.
    ///
    /// Called from `SlotPermit::drop`; must stay synchronous.
    pub(crate) fn release_slot(self: &Arc<Self>, user: UserId) {
        let mut st = self.lock();
        st.ledger.discharge(user);
        self.bus.publish(
            Event::new(EventKind::SlotReleased)
                .with_user(user)
                .with_count(st.ledger.total()),
        );
        self.promote_next(&mut st);
        self.active_tx.send_replace(st.ledger.total());
    }

    /// Promotes the first eligible queued entry, if any.
    ///
    /// A waiter whose receiving half is gone (the caller dropped its acquire
    /// future) cannot be admitted; its charge is undone and the scan
    /// continues with the next eligible entry.
    fn promote_next(self: &Arc<Self>, st: &mut State) {
        self.purge_expired(st);
        loop {
            let State { ledger, queue } = &mut *st;
            let Some(waiter) =
                queue.take_first_eligible(|u| ledger.has_room(u, self.per_user, self.global))
            else {
                return;
            };

            ledger.charge(waiter.user);
            let user = waiter.user;
            let waited = waiter.queued_at.elapsed();
            let permit = SlotPermit::new(Arc::clone(self), user);
            match waiter.tx.send(Resolution::Admitted(permit)) {
                Ok(()) => {
                    self.bus.publish(
                        Event::new(EventKind::RequestAdmitted)
                            .with_user(user)
                            .with_delay(waited),
                    );
                    return;
                }
                Err(res) => {
                    st.ledger.discharge(user);
                    if let Resolution::Admitted(p) = res {
                        p.defuse();
                    }
                }
            }
        }
    }

    /// Drops every queued entry whose deadline has passed, resolving each as
    /// expired.
    ///
    /// A live parked caller removes its own entry at the deadline; an
    /// abandoned future takes that timer with it, so scans and snapshots
    /// sweep such leftovers out here.
    fn purge_expired(&self, st: &mut State) {
        for waiter in st.queue.remove_expired(Instant::now()) {
            let user = waiter.user;
            let waited = waiter.deadline.duration_since(waiter.queued_at);
            let _ = waiter.tx.send(Resolution::Expired { waited });
            self.bus.publish(
                Event::new(EventKind::RequestExpired)
                    .with_user(user)
                    .with_timeout(waited),
            );
        }
    }

    /// Removes the entry with the given id if it is still queued.
    ///
    /// Returns `true` when expiry won the race; `false` means the entry was
    /// already resolved by another transition.
    fn expire(&self, id: u64, user: UserId, timeout: Duration) -> bool {
        let removed = self.lock().queue.remove(id);
        match removed {
            Some(_waiter) => {
                self.bus.publish(
                    Event::new(EventKind::RequestExpired)
                        .with_user(user)
                        .with_timeout(timeout),
                );
                true
            }
            None => false,
        }
    }
}

/// Public entry point for slot admission.
///
/// Cheap to clone; all clones share one ledger and queue.
///
/// ## Example
/// ```
/// use jobgate::{AdmissionController, Bus, GateConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctl = AdmissionController::new(&GateConfig::default(), Bus::new(16));
/// let permit = ctl.acquire(42).await.unwrap();
/// assert_eq!(ctl.stats().total_active, 1);
/// permit.release();
/// assert_eq!(ctl.stats().total_active, 0);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AdmissionController {
    shared: Arc<Shared>,
}

impl AdmissionController {
    /// Creates a controller from the gate configuration.
    pub fn new(cfg: &GateConfig, bus: Bus) -> Self {
        let (active_tx, _rx) = watch::channel(0usize);
        Self {
            shared: Arc::new(Shared {
                per_user: cfg.per_user_limit,
                global: cfg.global_limit,
                queue_timeout: cfg.queue_timeout,
                bus,
                state: Mutex::new(State::default()),
                active_tx,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Acquires a slot for `user`, suspending while no slot is free.
    ///
    /// Resolves exactly once with one of:
    /// - `Ok(permit)` — admitted, immediately or after queueing;
    /// - `Err(Cancelled)` — removed by [`AdmissionController::cancel_user`];
    /// - `Err(TimedOut)` — waited past the configured queue timeout;
    /// - `Err(Shutdown)` — removed by [`AdmissionController::clear_all`].
    pub async fn acquire(&self, user: UserId) -> Result<SlotPermit, GateError> {
        let timeout = self.shared.queue_timeout;
        let (id, mut rx, deadline) = {
            let mut st = self.shared.lock();
            if st
                .ledger
                .has_room(user, self.shared.per_user, self.shared.global)
            {
                st.ledger.charge(user);
                let total = st.ledger.total();
                self.shared.bus.publish(
                    Event::new(EventKind::SlotAcquired)
                        .with_user(user)
                        .with_count(total),
                );
                self.shared.active_tx.send_replace(total);
                return Ok(SlotPermit::new(Arc::clone(&self.shared), user));
            }

            let id = self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed);
            let (tx, rx) = oneshot::channel();
            let now = Instant::now();
            let deadline = now + timeout;
            st.queue.push(Waiter {
                id,
                user,
                queued_at: now,
                deadline,
                tx,
            });
            self.shared.bus.publish(
                Event::new(EventKind::RequestQueued)
                    .with_user(user)
                    .with_count(st.queue.len())
                    .with_timeout(timeout),
            );
            (id, rx, deadline)
        };

        tokio::select! {
            res = &mut rx => Self::map_resolution(res),
            _ = time::sleep_until(deadline) => {
                if self.shared.expire(id, user, timeout) {
                    Err(GateError::TimedOut { waited: timeout })
                } else {
                    // Lost the race: another transition already resolved us.
                    Self::map_resolution(rx.await)
                }
            }
        }
    }

    fn map_resolution(
        res: Result<Resolution, oneshot::error::RecvError>,
    ) -> Result<SlotPermit, GateError> {
        match res {
            Ok(Resolution::Admitted(permit)) => Ok(permit),
            Ok(Resolution::Cancelled) => Err(GateError::Cancelled),
            Ok(Resolution::Expired { waited }) => Err(GateError::TimedOut { waited }),
            Ok(Resolution::Shutdown) => Err(GateError::Shutdown),
            // Sender dropped without resolving: the controller is gone.
            Err(_) => Err(GateError::Shutdown),
        }
    }

    /// Cancels every still-queued request of `user` and returns the count.
    ///
    /// Active slots are untouched; cancellation reaches queued, not running,
    /// work.
    pub fn cancel_user(&self, user: UserId) -> usize {
        let removed = {
            let mut st = self.shared.lock();
            self.shared.purge_expired(&mut st);
            st.queue.remove_user(user)
        };
        let count = removed.len();
        for waiter in removed {
            let _ = waiter.tx.send(Resolution::Cancelled);
        }
        if count > 0 {
            self.shared.bus.publish(
                Event::new(EventKind::RequestCancelled)
                    .with_user(user)
                    .with_count(count),
            );
        }
        count
    }

    /// Clears the whole queue, resolving every entry as shutdown.
    ///
    /// Active slots are untouched. Returns the number of entries cleared.
    pub fn clear_all(&self) -> usize {
        let removed = {
            let mut st = self.shared.lock();
            self.shared.purge_expired(&mut st);
            st.queue.drain_all()
        };
        let count = removed.len();
        for waiter in removed {
            let _ = waiter.tx.send(Resolution::Shutdown);
        }
        self.shared
            .bus
            .publish(Event::new(EventKind::QueueCleared).with_count(count));
        count
    }

    /// Waits until every active slot has been released, up to `timeout`.
    ///
    /// Returns `true` once the active count reaches zero, `false` when the
    /// timeout elapses first. Never cancels or interrupts active work.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.active_tx.subscribe();
        let drained = time::timeout(timeout, rx.wait_for(|active| *active == 0)).await;
        matches!(drained, Ok(Ok(_)))
    }

    /// Point-in-time snapshot. Entries past their deadline are swept out
    /// first, so the queued count never includes expired leftovers.
    pub fn stats(&self) -> GateStats {
        let mut st = self.shared.lock();
        self.shared.purge_expired(&mut st);
        GateStats {
            total_active: st.ledger.total(),
            total_queued: st.queue.len(),
            active_by_user: st.ledger.snapshot(),
        }
    }

    /// Users currently holding at least one active slot.
    pub(crate) fn active_users(&self) -> Vec<UserId> {
        self.shared.lock().ledger.users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(per_user: usize, global: usize, timeout: Duration) -> AdmissionController {
        let cfg = GateConfig {
            per_user_limit: per_user,
            global_limit: global,
            queue_timeout: timeout,
            ..GateConfig::default()
        };
        AdmissionController::new(&cfg, Bus::new(64))
    }

    /// Yields until the queue settles at the expected length.
    async fn settle(ctl: &AdmissionController, queued: usize) {
        for _ in 0..200 {
            if ctl.stats().total_queued == queued {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("queue did not settle at {queued}");
    }

    fn spawn_acquire(
        ctl: &AdmissionController,
        user: UserId,
    ) -> tokio::task::JoinHandle<Result<SlotPermit, GateError>> {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.acquire(user).await })
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_admission_under_limits() {
        let ctl = controller(2, 3, Duration::from_secs(300));
        let p = ctl.acquire(1).await.unwrap();
        assert_eq!(p.user(), 1);

        let stats = ctl.stats();
        assert_eq!(stats.total_active, 1);
        assert_eq!(stats.total_queued, 0);
        assert_eq!(stats.active_by_user.get(&1), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_frees_slot() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let p = ctl.acquire(1).await.unwrap();
        p.release();
        assert_eq!(ctl.stats().total_active, 0);
        // Slot is reusable right away.
        let _p2 = ctl.acquire(1).await.unwrap();
        assert_eq!(ctl.stats().total_active, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_four_users() {
        // P=2, G=3: A, B, C admitted immediately; D queues; A's release
        // promotes D.
        let ctl = controller(2, 3, Duration::from_secs(300));
        let a = ctl.acquire(1).await.unwrap();
        let _b = ctl.acquire(2).await.unwrap();
        let _c = ctl.acquire(3).await.unwrap();

        let d = spawn_acquire(&ctl, 4);
        settle(&ctl, 1).await;
        assert_eq!(ctl.stats().total_active, 3);

        drop(a);
        let _d = d.await.unwrap().unwrap();

        let stats = ctl.stats();
        assert_eq!(stats.total_active, 3);
        assert_eq!(stats.total_queued, 0);
        assert_eq!(stats.active_by_user.get(&4), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_skips_user_at_cap() {
        // Keep the global ceiling saturated with a third user so both A's
        // second request and B's request queue; the scan must then skip A's
        // entry (A is at its per-user ceiling) and promote B's.
        let ctl = controller(1, 2, Duration::from_secs(300));
        let c1 = ctl.acquire(3).await.unwrap();
        let a1 = ctl.acquire(1).await.unwrap();

        let a2 = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;
        let b1 = spawn_acquire(&ctl, 2);
        settle(&ctl, 2).await;

        drop(c1);
        let b_permit = b1.await.unwrap().unwrap();
        assert_eq!(b_permit.user(), 2);

        // A's second request is still parked behind its own ceiling.
        let stats = ctl.stats();
        assert_eq!(stats.total_queued, 1);
        assert_eq!(stats.active_by_user.get(&1), Some(&1));
        assert_eq!(stats.active_by_user.get(&2), Some(&1));

        drop(a1);
        let _a2 = a2.await.unwrap().unwrap();
        assert_eq!(ctl.stats().total_queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_requests_keep_arrival_order() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let first = ctl.acquire(1).await.unwrap();

        let second = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;
        let third = spawn_acquire(&ctl, 1);
        settle(&ctl, 2).await;

        drop(first);
        let second = second.await.unwrap().unwrap();
        assert_eq!(ctl.stats().total_queued, 1);

        drop(second);
        let _third = third.await.unwrap().unwrap();
        assert_eq!(ctl.stats().total_queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resolves_queued_only() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let active = ctl.acquire(1).await.unwrap();

        let w1 = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;
        let w2 = spawn_acquire(&ctl, 1);
        settle(&ctl, 2).await;

        assert_eq!(ctl.cancel_user(1), 2);
        assert_eq!(w1.await.unwrap().unwrap_err(), GateError::Cancelled);
        assert_eq!(w2.await.unwrap().unwrap_err(), GateError::Cancelled);

        // The active slot is unaffected, and repeat cancels find nothing.
        assert_eq!(ctl.stats().total_active, 1);
        assert_eq!(ctl.cancel_user(1), 0);
        drop(active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_only_touches_owner() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let _active = ctl.acquire(1).await.unwrap();

        let other = spawn_acquire(&ctl, 2);
        settle(&ctl, 1).await;

        assert_eq!(ctl.cancel_user(3), 0);
        assert_eq!(ctl.stats().total_queued, 1);

        assert_eq!(ctl.cancel_user(2), 1);
        assert_eq!(other.await.unwrap().unwrap_err(), GateError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_wait_times_out() {
        let timeout = Duration::from_secs(5);
        let ctl = controller(1, 1, timeout);
        let _active = ctl.acquire(1).await.unwrap();

        let waiter = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;

        time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            waiter.await.unwrap().unwrap_err(),
            GateError::TimedOut { waited: timeout }
        );
        assert_eq!(ctl.stats().total_queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_wins_race_against_expiry() {
        let ctl = controller(1, 1, Duration::from_secs(5));
        let active = ctl.acquire(1).await.unwrap();

        let waiter = spawn_acquire(&ctl, 2);
        settle(&ctl, 1).await;

        time::advance(Duration::from_secs(4)).await;
        drop(active);

        // The deadline passes after promotion; the entry is already gone and
        // the expiry path is a no-op.
        time::advance(Duration::from_secs(2)).await;
        let permit = waiter.await.unwrap().unwrap();
        assert_eq!(permit.user(), 2);
        assert_eq!(ctl.stats().total_active, 1);
        assert_eq!(ctl.stats().total_queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_spares_active_slots() {
        let ctl = controller(1, 2, Duration::from_secs(300));
        let active = ctl.acquire(1).await.unwrap();
        let _active2 = ctl.acquire(2).await.unwrap();

        let queued = spawn_acquire(&ctl, 3);
        settle(&ctl, 1).await;

        assert_eq!(ctl.clear_all(), 1);
        assert_eq!(queued.await.unwrap().unwrap_err(), GateError::Shutdown);

        let stats = ctl.stats();
        assert_eq!(stats.total_active, 2);
        assert_eq!(stats.total_queued, 0);
        drop(active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_drain_reports_timeout() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let active = ctl.acquire(1).await.unwrap();
        assert!(!ctl.wait_for_drain(Duration::from_millis(50)).await);

        drop(active);
        assert!(ctl.wait_for_drain(Duration::from_millis(50)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_drain_observes_late_release() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let active = ctl.acquire(1).await.unwrap();

        tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            drop(active);
        });

        assert!(ctl.wait_for_drain(Duration::from_secs(10)).await);
        assert_eq!(ctl.stats().total_active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_global_ceiling_queues_until_expiry() {
        let ctl = controller(1, 0, Duration::from_secs(2));
        let waiter = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;

        assert_eq!(
            waiter.await.unwrap().unwrap_err(),
            GateError::TimedOut {
                waited: Duration::from_secs(2)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_per_user_ceiling_queues_until_expiry() {
        let ctl = controller(0, 4, Duration::from_secs(2));
        let waiter = spawn_acquire(&ctl, 1);
        settle(&ctl, 1).await;

        assert_eq!(
            waiter.await.unwrap().unwrap_err(),
            GateError::TimedOut {
                waited: Duration::from_secs(2)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_does_not_block_promotion() {
        let ctl = controller(1, 1, Duration::from_secs(300));
        let active = ctl.acquire(1).await.unwrap();

        // Park a waiter, then drop its future before it can be admitted.
        let abandoned = spawn_acquire(&ctl, 2);
        settle(&ctl, 1).await;
        let survivor = spawn_acquire(&ctl, 3);
        settle(&ctl, 2).await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(active);
        let permit = survivor.await.unwrap().unwrap();
        assert_eq!(permit.user(), 3);

        let stats = ctl.stats();
        assert_eq!(stats.total_active, 1);
        assert_eq!(stats.total_queued, 0);
        assert_eq!(stats.active_by_user.get(&2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_entry_is_swept_after_deadline() {
        let ctl = controller(1, 1, Duration::from_secs(5));
        let _active = ctl.acquire(1).await.unwrap();
        let mut rx = ctl.shared.bus.subscribe();

        // Abandon a parked request; its own deadline timer dies with it.
        let abandoned = spawn_acquire(&ctl, 2);
        settle(&ctl, 1).await;
        abandoned.abort();
        let _ = abandoned.await;

        time::advance(Duration::from_secs(60)).await;
        let stats = ctl.stats();
        assert_eq!(stats.total_queued, 0);
        assert_eq!(ctl.cancel_user(2), 0);

        // The sweep resolved the entry as expired, not silently dropped.
        let ev = loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::RequestExpired {
                break ev;
            }
        };
        assert_eq!(ev.user, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceilings_hold_under_churn() {
        let per_user = 2;
        let global = 3;
        let ctl = controller(per_user, global, Duration::from_secs(300));

        let mut permits = Vec::new();
        let mut handles = Vec::new();
        for user in [1, 1, 1, 2, 2, 3] {
            handles.push(spawn_acquire(&ctl, user));
        }
        for _ in 0..400 {
            tokio::task::yield_now().await;
            let stats = ctl.stats();
            assert!(stats.total_active <= global);
            assert!(stats.active_by_user.values().all(|&n| n <= per_user));
            let sum: usize = stats.active_by_user.values().sum();
            assert_eq!(stats.total_active, sum);
        }

        // Drain everything that got admitted so far, then the rest.
        for h in handles {
            if h.is_finished() {
                if let Ok(Ok(p)) = h.await {
                    permits.push(p);
                }
            } else {
                drop(permits.drain(..));
                if let Ok(p) = h.await.unwrap() {
                    permits.push(p);
                }
            }
        }
        drop(permits);
        assert!(ctl.wait_for_drain(Duration::from_secs(1)).await);
    }
}
