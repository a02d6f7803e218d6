use thiserror::Error;

/// Failure raised by a single [`SolveAdapter`](crate::SolveAdapter)
/// operation.
///
/// Host integrations convert whatever their API raises into this type; the
/// controller never sees a raw host error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("adapter operation `{operation}` failed: {reason}")]
pub struct AdapterError {
    /// Name of the adapter operation that failed.
    pub operation: &'static str,
    /// Host-reported failure detail.
    pub reason: String,
}

impl AdapterError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Terminal error for one node's refinement run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolveError {
    /// Malformed configuration, rejected before any adapter call and never
    /// retried.
    #[error("invalid solve parameters: {0}")]
    InvalidParameters(String),
    /// An adapter operation failed. Fatal to this node, not retried.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// Pruning removed every track; nothing is left to solve against.
    #[error("no valid tracks remain after pruning (iteration {iteration})")]
    NoValidTracks { iteration: u32 },
    /// Run stopped by cooperative cancellation. Reported as a distinct
    /// outcome, not logged as an error.
    #[error("run cancelled")]
    Cancelled,
}
