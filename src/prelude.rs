//! Convenient imports for strata-query.
//!
//! ```ignore
//! use strata_query::prelude::*;
//!
//! let engine = QueryEngine::new()?;
//! ```

// Main entry point
pub use crate::engine::{QueryEngine, QueryEngineBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Runners
pub use crate::runner::{Runner, RunnerState};
pub use crate::yield_policy::{run_to_completion, YieldPolicy};

// Query types
pub use strata_core::{
    Document, Namespace, Predicate, Projection, QueryDescriptor, RecordLocation, SortSpec,
};

// Re-export serde_json for convenience
pub use serde_json::json;
