//! Core types for the Strata query runner layer
//!
//! This crate defines the vocabulary shared by storage, execution and the
//! runners:
//! - Identifiers: [`RunnerId`], [`Namespace`], [`RecordLocation`]
//! - Invalidation notices: [`Invalidation`], [`InvalidationKind`]
//! - Documents and the canonical value order
//! - Canonical queries ([`QueryDescriptor`]) and their shapes
//! - Query solutions ([`QuerySolution`]) describing the chosen access path
//! - The shared [`Error`] type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod query;
pub mod solution;
pub mod types;

pub use document::{canonical_cmp, Document, ID_FIELD};
pub use error::{Error, Result};
pub use query::{
    CompareOp, Predicate, Projection, QueryBuilder, QueryDescriptor, QueryShape, SortDirection,
    SortKey, SortSpec,
};
pub use solution::{QuerySolution, ScanDirection, SolutionNode};
pub use types::{Invalidation, InvalidationKind, Namespace, RecordLocation, RunnerId};
