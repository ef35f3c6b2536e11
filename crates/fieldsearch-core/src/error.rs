use std::time::Duration;

use thiserror::Error;

/// Failures on the mutation and metadata path of an index store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The document was rejected before any mutation was attempted.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Engine-level I/O or corruption. The index is left as it was.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IndexError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Failures on the query path. A failed query never degrades to an empty page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query has no searchable terms")]
    Empty,

    #[error("Unbalanced phrase quote at byte {position}")]
    UnbalancedQuote { position: usize },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueryError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Schema(msg) | IndexError::Storage(msg) => Self::Storage(msg),
        }
    }
}

/// The task substrate refused a submission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Task rejected: {0}")]
    Rejected(String),

    #[error("Task executor is shut down")]
    ShutDown,
}

/// Remote search outcomes that are reported to the remote callback only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteSearchError {
    #[error("Remote search failed: {0}")]
    Failed(String),

    #[error("Remote search timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Remote search dropped its completion")]
    Dropped,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

pub type Result<T> = std::result::Result<T, Error>;
