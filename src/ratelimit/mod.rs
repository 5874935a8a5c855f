//! Message-rate limiting, independent of slot availability.
//!
//! Internal modules:
//! - [`window`]: a fixed `{count, deadline}` counting window;
//! - [`gate`]: the per-user three-granularity table, decision logic, and
//!   background sweeper.

mod gate;
mod window;

pub use gate::{RateDecision, RateGate, RateUsage};
