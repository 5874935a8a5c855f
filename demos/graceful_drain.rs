//! # Example: graceful_drain
//!
//! Shows the shutdown sequence: intake closes, queued requests resolve as
//! shutdown, and in-flight work is given a grace period to finish.
//!
//! ## Flow
//! ```text
//! submit(1) ──► admitted, "job" runs for 2s
//! submit(2) ──► queued
//! Ctrl-C (or the built-in 1s fallback timer)
//!     └─► gate.shutdown()
//!           ├─► queued request resolves Err(Shutdown)
//!           └─► waits for the running job, then exits cleanly
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example graceful_drain --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use jobgate::{wait_for_shutdown_signal, GateConfig, JobGate, LogWriter};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = GateConfig::default();
    cfg.per_user_limit = 1;
    cfg.global_limit = 1;
    cfg.grace = Duration::from_secs(5);

    let subs: Vec<Arc<dyn jobgate::Subscribe>> = vec![Arc::new(LogWriter)];
    let gate = Arc::new(JobGate::new(cfg, subs));
    let token = CancellationToken::new();
    gate.run_background(token.clone());

    // A running job that takes a while to finish.
    let running = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            let permit = gate.submit(1).await.expect("admitted");
            tokio::time::sleep(Duration::from_secs(2)).await;
            permit.release();
            println!("[job] user 1 finished");
        })
    };

    // A second request that will still be queued when the drain starts.
    let queued = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            match gate.submit(2).await {
                Ok(p) => p.release(),
                Err(e) => println!("[job] user 2 not admitted: {}", e.as_message()),
            }
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Drain on Ctrl-C, or after a short fallback so the demo exits on its own.
    tokio::select! {
        _ = wait_for_shutdown_signal() => println!("[main] signal received"),
        _ = tokio::time::sleep(Duration::from_secs(1)) => println!("[main] demo timer elapsed"),
    }

    token.cancel();
    match gate.shutdown().await {
        Ok(()) => println!("[main] drained cleanly"),
        Err(e) => println!("[main] forced: {}", e.as_message()),
    }

    let _ = queued.await;
    let _ = running.await;
    Ok(())
}
