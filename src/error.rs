//! Error taxonomy for the autoscheduler core (spec §7: three classes).

use thiserror::Error;

/// The three error classes the core distinguishes: internal invariant
/// violations, numeric overflow, and cost-model failures. Variants 1 and 2
/// are bugs in the core or its inputs, never user-recoverable; variant 3 is
/// surfaced from an external collaborator and has no recovery policy beyond
/// aborting the search.
#[derive(Debug, Error)]
pub enum AutoschedulerError {
    /// An internal invariant was violated: bad id, unmatched `Layout`
    /// release, dimension mismatch in Jacobian composition, a
    /// decisions-counter mismatch, or total mortality of the beam.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Overflow in `OptionalRational` arithmetic. Never truncated silently.
    #[error("numeric overflow in rational arithmetic: {0}")]
    Overflow(String),

    /// The external cost model failed to evaluate a batch.
    #[error("cost model failure: {0}")]
    CostModel(String),
}

pub type AutoschedulerResult<T> = Result<T, AutoschedulerError>;

impl AutoschedulerError {
    pub fn internal(msg: impl Into<String>) -> Self {
        AutoschedulerError::Internal(msg.into())
    }
}

/// Raise and log a fatal internal error. The core treats internal invariant
/// violations as bugs, not inputs: this logs at `error` level (so the
/// diagnostic survives even if the caller discards the `Result`) before
/// returning `Err`.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::error!(%msg, "internal invariant violated");
        return Err($crate::error::AutoschedulerError::internal(msg));
    }};
}
