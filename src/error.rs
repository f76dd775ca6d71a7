//! Error type for the query runner layer
//!
//! Wraps the lower layers' errors into one user-facing enum and adds the
//! errors only the runner layer can produce.

use strata_core::RunnerId;
use thiserror::Error;

/// All query runner errors
#[derive(Debug, Error)]
pub enum Error {
    /// The runner was killed (collection dropped, shutdown, explicit kill)
    /// before it finished
    #[error("runner {0} was killed")]
    Killed(RunnerId),

    /// Query failed validation, or its plan could not be built
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Collection or record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// The read handle already drives a live runner
    #[error("read handle already drives a runner")]
    AccessInUse,

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for query runner operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the operation ended because its runner was killed
    pub fn is_killed(&self) -> bool {
        matches!(self, Error::Killed(_))
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a serious/unrecoverable error
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Storage(_))
    }
}

impl From<strata_core::Error> for Error {
    fn from(e: strata_core::Error) -> Self {
        use strata_core::Error as CoreError;
        match e {
            CoreError::InvalidQuery(msg) => Error::InvalidQuery(msg),
            CoreError::InvalidNamespace(msg) => Error::InvalidQuery(format!("namespace: {}", msg)),
            CoreError::NamespaceNotFound(ns) => Error::NotFound(format!("namespace {}", ns)),
            CoreError::RecordNotFound {
                namespace,
                location,
            } => Error::NotFound(format!("{} in {}", location, namespace)),
            CoreError::NotADocument(msg) => Error::Serialization(msg),
            CoreError::Storage(msg) => Error::Storage(msg),
            CoreError::InvalidConfig(msg) => Error::InvalidConfig(msg),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
