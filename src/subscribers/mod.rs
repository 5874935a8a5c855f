//! Event subscribers: trait, fan-out set, and the built-in log writer.
//!
//! ## Contents
//! - [`Subscribe`] — the extension point for custom event handlers
//! - [`SubscriberSet`] — per-subscriber bounded queues with worker tasks
//! - `LogWriter` — stdout writer, behind the `logging` feature

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
