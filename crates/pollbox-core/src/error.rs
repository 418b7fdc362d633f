use thiserror::Error;

/// Errors surfaced by the core and its storage backends.
///
/// `Conflict` and `InvalidState` are legitimate business outcomes (a
/// duplicate vote, a closed poll) and are returned to the caller as such,
/// never retried internally.
#[derive(Debug, Error)]
pub enum PollError {
    /// The requested poll or option does not exist.
    #[error("not found")]
    NotFound,

    /// Malformed request: validation failure or a bad option reference.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The action is not permitted in the poll's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Uniqueness violation, e.g. a second vote for the same poll.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure or other unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PollError>;
