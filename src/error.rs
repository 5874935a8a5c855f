//! Error types used by the gate.
//!
//! This module defines two enums:
//!
//! - [`GateError`] — expected outcomes of the admission path. All four
//!   variants are ordinary control flow for the caller (show the user a
//!   message, maybe retry later); none of them indicates a broken gate.
//! - [`RuntimeError`] — failures of the gate runtime itself, currently only
//!   a drain that exceeded its grace period.
//!
//! Both types provide `as_label`/`as_message` helpers for logging/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::UserId;

/// # Expected outcomes of submitting a job to the gate.
///
/// Callers must treat every variant as a normal result requiring a
/// user-facing reply, not as a system failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Rejected by the rate gate before queueing; carries a retry hint.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the user's minute window rolls over.
        retry_after: Duration,
    },

    /// The queued request was cancelled by its owner.
    #[error("queued request cancelled")]
    Cancelled,

    /// The queued request waited past its deadline.
    #[error("queue wait exceeded {waited:?}")]
    TimedOut {
        /// The configured queue timeout that elapsed.
        waited: Duration,
    },

    /// The queue was cleared because the gate is shutting down.
    #[error("gate shutting down")]
    Shutdown,
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobgate::GateError;
    ///
    /// assert_eq!(GateError::Cancelled.as_label(), "request_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Cancelled => "request_cancelled",
            GateError::TimedOut { .. } => "queue_timeout",
            GateError::Shutdown => "gate_shutdown",
        }
    }

    /// Returns a human-readable message with details about the outcome.
    pub fn as_message(&self) -> String {
        match self {
            GateError::RateLimited { retry_after } => {
                format!("rate limited; retry in {retry_after:?}")
            }
            GateError::Cancelled => "cancelled while queued".to_string(),
            GateError::TimedOut { waited } => format!("timed out after {waited:?} in queue"),
            GateError::Shutdown => "cleared at shutdown".to_string(),
        }
    }

    /// Retry hint in whole seconds (ceiling), if this outcome carries one.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use jobgate::GateError;
    ///
    /// let err = GateError::RateLimited { retry_after: Duration::from_millis(1500) };
    /// assert_eq!(err.retry_after_secs(), Some(2));
    /// assert_eq!(GateError::Cancelled.retry_after_secs(), None);
    /// ```
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GateError::RateLimited { retry_after } => {
                Some((retry_after.as_millis() as u64).div_ceil(1000))
            }
            _ => None,
        }
    }
}

/// # Errors produced by the gate runtime.
///
/// These represent failures in the gate itself, such as a drain exceeding
/// its grace period with slots still held.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Drain grace period elapsed; some users still hold active slots.
    #[error("drain grace {grace:?} exceeded; still active: {still_active:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Users that still held at least one active slot.
        still_active: Vec<UserId>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use jobgate::RuntimeError;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), still_active: vec![] };
    /// assert_eq!(err.as_label(), "drain_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "drain_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded {
                grace,
                still_active,
            } => {
                format!("grace exceeded after {grace:?}; active users={still_active:?}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let cases = [
            (
                GateError::RateLimited {
                    retry_after: Duration::from_secs(1),
                },
                "rate_limited",
            ),
            (GateError::Cancelled, "request_cancelled"),
            (
                GateError::TimedOut {
                    waited: Duration::from_secs(300),
                },
                "queue_timeout",
            ),
            (GateError::Shutdown, "gate_shutdown"),
        ];
        for (err, label) in cases {
            assert_eq!(err.as_label(), label);
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = GateError::RateLimited {
            retry_after: Duration::from_millis(1),
        };
        assert_eq!(err.retry_after_secs(), Some(1));

        let err = GateError::RateLimited {
            retry_after: Duration::from_secs(60),
        };
        assert_eq!(err.retry_after_secs(), Some(60));
    }
}
