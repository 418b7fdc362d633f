use pollbox_core::PollError;
use thiserror::Error;

/// Errors produced by the SQLite layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// The (poll, visitor) uniqueness constraint rejected a second vote.
    #[error("Duplicate vote for this poll and visitor")]
    DuplicateVote,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The core sees storage failures through its own taxonomy: row absence is
/// `NotFound`, the uniqueness rejection is `Conflict`, everything else is
/// `Internal`.
impl From<StoreError> for PollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => PollError::NotFound,
            StoreError::DuplicateVote => {
                PollError::Conflict("already voted on this poll".into())
            }
            other => PollError::Internal(other.to_string()),
        }
    }
}
