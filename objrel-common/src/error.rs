//! Common error types for objrel

use thiserror::Error;

/// Common result type for objrel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the relation engine and its HTTP surface
///
/// Every variant maps to a stable machine-readable code (see [`Error::code`]).
#[derive(Error, Debug)]
pub enum Error {
    /// Store failure (wraps sqlx::Error), propagated unmodified and never retried
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry or configuration problem that makes the operation meaningless
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// One or more referenced rows do not exist
    #[error("Not found: {message} (ids: {})", format_ids(.ids))]
    NotFound { message: String, ids: Vec<i64> },

    /// Mutation would break relation type conformance
    #[error("Constraint violation: {message} (ids: {})", format_ids(.ids))]
    ConstraintViolation { message: String, ids: Vec<i64> },

    /// Operation exceeded its time budget and was aborted
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
}

impl Error {
    /// Stable error code exposed to callers
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIGURATION_ERROR",
            Error::InvalidInput(_) => "VALIDATION_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            Error::Timeout(_) => "TIMEOUT",
        }
    }

    /// Ids named by the error, if any
    pub fn offending_ids(&self) -> &[i64] {
        match self {
            Error::NotFound { ids, .. } | Error::ConstraintViolation { ids, .. } => ids,
            _ => &[],
        }
    }
}

fn format_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
