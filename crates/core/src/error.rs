//! Error types shared by the storage, executor and runner layers.

use crate::types::{Namespace, RecordLocation};
use thiserror::Error;

/// Errors raised below the runner layer.
///
/// Executor failures reach callers verbatim through
/// `RunnerState::Failed`, so every variant carries enough context to be
/// reported without further wrapping.
#[derive(Debug, Error)]
pub enum Error {
    /// Query failed validation or canonicalization
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Malformed `db.collection` name
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Collection does not exist
    #[error("namespace not found: {0}")]
    NamespaceNotFound(Namespace),

    /// No record at the given location
    #[error("record not found at {location} in {namespace}")]
    RecordNotFound {
        /// Collection that was searched
        namespace: Namespace,
        /// Location that was requested
        location: RecordLocation,
    },

    /// Value is not a JSON object and cannot be stored as a document
    #[error("not a document: {0}")]
    NotADocument(String),

    /// Storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NamespaceNotFound(_) | Error::RecordNotFound { .. }
        )
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Storage(_))
    }
}
