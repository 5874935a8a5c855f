//! # Example: basic_admission
//!
//! Minimal example of the admission path: a few users submit jobs, one of
//! them exceeds the ceilings and waits in the queue.
//!
//! Demonstrates how to:
//! - Build a [`JobGate`] with a [`GateConfig`] and the [`LogWriter`] subscriber.
//! - Submit jobs and hold/release [`SlotPermit`]s.
//! - Observe queueing and promotion through the log output.
//!
//! ## Flow
//! ```text
//! submit(1), submit(2), submit(3) ──► admitted (global ceiling = 3)
//! submit(4) ──► queued
//! drop(permit of 1) ──► 4 promoted
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic_admission --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use jobgate::{GateConfig, JobGate, LogWriter};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Two slots per user, three in total, short queue deadline
    let mut cfg = GateConfig::default();
    cfg.per_user_limit = 2;
    cfg.global_limit = 3;
    cfg.queue_timeout = Duration::from_secs(10);

    // 2. Gate with the stdout event writer
    let subs: Vec<Arc<dyn jobgate::Subscribe>> = vec![Arc::new(LogWriter)];
    let gate = Arc::new(JobGate::new(cfg, subs));
    let token = CancellationToken::new();
    gate.run_background(token.clone());

    // 3. Three users are admitted immediately
    let p1 = gate.submit(1).await?;
    let _p2 = gate.submit(2).await?;
    let _p3 = gate.submit(3).await?;
    println!("stats: {:?}", gate.stats());

    // 4. The fourth user queues until a slot frees
    let waiter = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.submit(4).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("stats while queued: {:?}", gate.stats());

    // 5. Releasing a slot promotes the queued request
    p1.release();
    let p4 = waiter.await??;
    println!("user {} admitted after waiting", p4.user());

    // 6. Finish all jobs, then drain and exit
    drop(_p2);
    drop(_p3);
    p4.release();
    token.cancel();
    gate.shutdown().await?;
    Ok(())
}
