//! Gate runtime: the facade and the shutdown path.
//!
//! The only public API from this module is [`JobGate`] plus the OS-signal
//! helper. The facade owns the bus, rate gate and admission controller and
//! wires the intake and drain sequences.
//!
//! Internal modules:
//! - [`gate`]: the `JobGate` facade (submit / cancel / stats / shutdown);
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod gate;
mod shutdown;

pub use gate::JobGate;
pub use shutdown::wait_for_shutdown_signal;
