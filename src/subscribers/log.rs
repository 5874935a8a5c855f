//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and the demos.
//!
//! ## Output format
//! ```text
//! [acquired] user=42 active=2
//! [queued] user=42 queued=3 timeout=300000ms
//! [admitted] user=42 waited=1250ms
//! [rate-limited] user=42 retry-in=31000ms
//! [expired] user=42 after=300000ms
//! [drain-requested]
//! [drained-within-grace]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::RateLimited => {
                println!(
                    "[rate-limited] user={:?} retry-in={:?}ms",
                    e.user, e.delay_ms
                );
            }
            EventKind::SlotAcquired => {
                println!("[acquired] user={:?} active={:?}", e.user, e.count);
            }
            EventKind::RequestQueued => {
                println!(
                    "[queued] user={:?} queued={:?} timeout={:?}ms",
                    e.user, e.count, e.timeout_ms
                );
            }
            EventKind::RequestAdmitted => {
                println!("[admitted] user={:?} waited={:?}ms", e.user, e.delay_ms);
            }
            EventKind::SlotReleased => {
                println!("[released] user={:?} active={:?}", e.user, e.count);
            }
            EventKind::RequestCancelled => {
                println!("[cancelled] user={:?} removed={:?}", e.user, e.count);
            }
            EventKind::RequestExpired => {
                println!("[expired] user={:?} after={:?}ms", e.user, e.timeout_ms);
            }
            EventKind::QueueCleared => {
                println!("[queue-cleared] removed={:?}", e.count);
            }
            EventKind::EntriesPruned => {
                println!("[rate-entries-pruned] removed={:?}", e.count);
            }
            EventKind::DrainRequested => {
                println!("[drain-requested]");
            }
            EventKind::DrainedWithin => {
                println!("[drained-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded] still-active={:?}", e.count);
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                println!("[subscriber-issue] reason={:?}", e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
