//! Core types for the query runner layer
//!
//! This module defines the fundamental identifiers used throughout the system:
//! - [`RunnerId`]: Unique identifier for a live query runner
//! - [`Namespace`]: `db.collection` pair naming a record collection
//! - [`RecordLocation`]: Stable-until-invalidated handle to a stored record
//! - [`Invalidation`]: Notice that a record location was moved or removed

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a runner
///
/// RunnerId is the key of the runner registry. It's used in:
/// - Registry registration/deregistration around yields
/// - Targeted kill signals
/// - Log fields for yield and invalidation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunnerId(Uuid);

impl RunnerId {
    /// Create a new random RunnerId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::types::RunnerId;
    ///
    /// let id1 = RunnerId::new();
    /// let id2 = RunnerId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        RunnerId(Uuid::new_v4())
    }

    /// Create RunnerId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        RunnerId(Uuid::from_bytes(bytes))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RunnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace naming one record collection
///
/// Written as `db.collection`. The database part may not contain a dot;
/// the collection part may (`app.system.profile` is `app` + `system.profile`).
///
/// # Examples
///
/// ```
/// use strata_core::types::Namespace;
///
/// let ns = Namespace::parse("shop.orders").unwrap();
/// assert_eq!(ns.db, "shop");
/// assert_eq!(ns.collection, "orders");
/// assert_eq!(ns.to_string(), "shop.orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub db: String,
    /// Collection name within the database
    pub collection: String,
}

impl Namespace {
    /// Create a namespace, validating both parts
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let db = db.into();
        let collection = collection.into();
        if db.is_empty() || collection.is_empty() {
            return Err(Error::InvalidNamespace(format!("{}.{}", db, collection)));
        }
        if db.contains('.') {
            return Err(Error::InvalidNamespace(format!(
                "database name '{}' may not contain '.'",
                db
            )));
        }
        Ok(Self { db, collection })
    }

    /// Parse a namespace from its `db.collection` form
    pub fn parse(full: &str) -> Result<Self> {
        match full.split_once('.') {
            Some((db, collection)) => Self::new(db, collection),
            None => Err(Error::InvalidNamespace(full.to_string())),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Physical location of a record inside a collection
///
/// Locations are allocated monotonically by the record store and are never
/// reused, so ordering by location is insertion order. A location stays
/// valid until the record is moved or removed, at which point an
/// [`Invalidation`] is broadcast for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordLocation(u64);

impl RecordLocation {
    /// Wrap a raw location value
    pub const fn new(raw: u64) -> Self {
        RecordLocation(raw)
    }

    /// Raw location value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loc:{}", self.0)
    }
}

/// What happened to an invalidated location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationKind {
    /// The record is being deleted
    Removed,
    /// The record is being relocated to `to` (e.g. it outgrew its allocation)
    Moved {
        /// New location of the record
        to: RecordLocation,
    },
}

/// Notice sent by a writer before it moves or removes a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    /// The location that is no longer valid
    pub location: RecordLocation,
    /// Removal or relocation
    pub kind: InvalidationKind,
}

impl Invalidation {
    /// Invalidation for a record about to be removed
    pub fn removed(location: RecordLocation) -> Self {
        Self {
            location,
            kind: InvalidationKind::Removed,
        }
    }

    /// Invalidation for a record about to move from `from` to `to`
    pub fn moved(from: RecordLocation, to: RecordLocation) -> Self {
        Self {
            location: from,
            kind: InvalidationKind::Moved { to },
        }
    }
}
