//! Location-addressed record store
//!
//! Records live in per-namespace shards keyed by [`RecordLocation`].
//! Locations come from one monotonically increasing counter and are never
//! reused, so a shard's `BTreeMap` order is insertion order and a scan can
//! resume from "the last location I looked at" even after that record is
//! gone.
//!
//! # Design
//!
//! - DashMap: one shard per namespace, different collections never contend
//! - BTreeMap: ordered locations for resumable scans
//! - Power-of-two allocations: an update stays in place while its encoding
//!   fits the record's allocation, otherwise the record moves
//!
//! # Invalidation
//!
//! Before a record is moved or removed, the store hands an [`Invalidation`]
//! to the installed [`InvalidationListener`] and waits for it to return.
//! The listener runs while the store holds none of its own locks, and the
//! old record is still readable at that moment.
//!
//! Writers are expected to hold exclusive access to the dataset while
//! mutating; the store itself only guarantees per-shard atomicity.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_core::{
    Document, Error, Invalidation, Namespace, RecordLocation, Result, ScanDirection,
};
use tracing::{debug, trace};

/// Smallest allocation handed to a record, in bytes
pub const MIN_ALLOCATION: usize = 32;

/// Receives invalidation notices from writers
///
/// Implemented by the runner registry. Calls are synchronous: the writer
/// does not proceed until every affected runner has processed the notice.
pub trait InvalidationListener: Send + Sync {
    /// A record in `namespace` is about to be moved or removed
    fn invalidate(&self, namespace: &Namespace, invalidation: &Invalidation);

    /// The whole collection is about to be dropped
    fn namespace_dropped(&self, namespace: &Namespace);
}

/// Allocation size for a record whose encoding is `size` bytes
pub fn allocation_for(size: usize) -> usize {
    size.max(MIN_ALLOCATION).next_power_of_two()
}

#[derive(Debug, Clone)]
struct Record {
    document: Document,
    allocated: usize,
}

impl Record {
    fn new(document: Document) -> Self {
        let allocated = allocation_for(document.encoded_size());
        Self {
            document,
            allocated,
        }
    }
}

/// Records of one namespace, ordered by location
#[derive(Debug, Default)]
pub struct Collection {
    records: BTreeMap<RecordLocation, Record>,
}

impl Collection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of [`RecordStore::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Where the record lives after the update
    pub location: RecordLocation,
    /// Whether the record had to move
    pub moved: bool,
}

/// In-memory record store, sharded by namespace
///
/// # Example
///
/// ```ignore
/// use strata_storage::RecordStore;
///
/// let store = RecordStore::new();
/// let loc = store.insert(&ns, doc);
/// assert!(store.get(&ns, loc).is_some());
/// ```
pub struct RecordStore {
    collections: DashMap<Namespace, Collection>,
    next_location: AtomicU64,
    version: AtomicU64,
    listener: RwLock<Option<Arc<dyn InvalidationListener>>>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            next_location: AtomicU64::new(1),
            version: AtomicU64::new(0),
            listener: RwLock::new(None),
        }
    }

    /// Create with expected number of collections
    pub fn with_capacity(num_collections: usize) -> Self {
        Self {
            collections: DashMap::with_capacity(num_collections),
            ..Self::new()
        }
    }

    /// Install the listener that receives invalidation notices
    pub fn set_invalidation_listener(&self, listener: Arc<dyn InvalidationListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Remove the installed listener
    pub fn clear_invalidation_listener(&self) {
        *self.listener.write() = None;
    }

    /// Current write version; bumped on every mutation
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[inline]
    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn allocate_location(&self) -> RecordLocation {
        RecordLocation::new(self.next_location.fetch_add(1, Ordering::AcqRel))
    }

    fn listener(&self) -> Option<Arc<dyn InvalidationListener>> {
        self.listener.read().clone()
    }

    fn notify(&self, namespace: &Namespace, invalidation: &Invalidation) {
        if let Some(listener) = self.listener() {
            listener.invalidate(namespace, invalidation);
        }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Create a collection; returns false if it already existed
    pub fn create_collection(&self, namespace: &Namespace) -> bool {
        let mut created = false;
        self.collections
            .entry(namespace.clone())
            .or_insert_with(|| {
                created = true;
                Collection::new()
            });
        created
    }

    /// Check if a collection exists
    pub fn has_collection(&self, namespace: &Namespace) -> bool {
        self.collections.contains_key(namespace)
    }

    /// Drop a collection and all its records
    ///
    /// The listener is told first so runners on the namespace can be killed
    /// before their records disappear. Returns false if there was nothing
    /// to drop.
    pub fn drop_collection(&self, namespace: &Namespace) -> bool {
        if !self.has_collection(namespace) {
            return false;
        }
        if let Some(listener) = self.listener() {
            listener.namespace_dropped(namespace);
        }
        let dropped = self.collections.remove(namespace).is_some();
        if dropped {
            self.bump_version();
            debug!(namespace = %namespace, "Dropped collection");
        }
        dropped
    }

    /// Names of all collections, sorted
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut names: Vec<_> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of records in a collection (0 if it does not exist)
    pub fn len(&self, namespace: &Namespace) -> usize {
        self.collections
            .get(namespace)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Total records across all collections
    pub fn total_records(&self) -> usize {
        self.collections.iter().map(|e| e.value().len()).sum()
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Insert a document, creating the collection if needed
    pub fn insert(&self, namespace: &Namespace, document: Document) -> RecordLocation {
        let location = self.allocate_location();
        self.collections
            .entry(namespace.clone())
            .or_default()
            .records
            .insert(location, Record::new(document));
        self.bump_version();
        trace!(namespace = %namespace, %location, "Inserted record");
        location
    }

    /// Read the document at a location
    #[inline]
    pub fn get(&self, namespace: &Namespace, location: RecordLocation) -> Option<Document> {
        self.collections
            .get(namespace)
            .and_then(|c| c.records.get(&location).map(|r| r.document.clone()))
    }

    /// Check if a location holds a record
    #[inline]
    pub fn contains(&self, namespace: &Namespace, location: RecordLocation) -> bool {
        self.collections
            .get(namespace)
            .map(|c| c.records.contains_key(&location))
            .unwrap_or(false)
    }

    /// Allocation of the record at a location
    pub fn allocated_size(&self, namespace: &Namespace, location: RecordLocation) -> Option<usize> {
        self.collections
            .get(namespace)
            .and_then(|c| c.records.get(&location).map(|r| r.allocated))
    }

    /// Replace the document at a location
    ///
    /// Stays in place while the new encoding fits the allocation. Otherwise
    /// the record moves to a fresh location; the listener hears about the
    /// move before it happens.
    pub fn update(
        &self,
        namespace: &Namespace,
        location: RecordLocation,
        document: Document,
    ) -> Result<UpdateOutcome> {
        let allocated = self
            .allocated_size(namespace, location)
            .ok_or_else(|| self.missing(namespace, location))?;

        if document.encoded_size() <= allocated {
            let mut collection = self
                .collections
                .get_mut(namespace)
                .ok_or_else(|| Error::NamespaceNotFound(namespace.clone()))?;
            let record = collection
                .records
                .get_mut(&location)
                .ok_or_else(|| self.missing(namespace, location))?;
            record.document = document;
            drop(collection);
            self.bump_version();
            trace!(namespace = %namespace, %location, "Updated record in place");
            return Ok(UpdateOutcome {
                location,
                moved: false,
            });
        }

        let to = self.allocate_location();
        self.notify(namespace, &Invalidation::moved(location, to));

        let mut collection = self
            .collections
            .get_mut(namespace)
            .ok_or_else(|| Error::NamespaceNotFound(namespace.clone()))?;
        if collection.records.remove(&location).is_none() {
            return Err(self.missing(namespace, location));
        }
        collection.records.insert(to, Record::new(document));
        drop(collection);
        self.bump_version();
        debug!(namespace = %namespace, from = %location, %to, "Moved record");
        Ok(UpdateOutcome {
            location: to,
            moved: true,
        })
    }

    /// Remove the record at a location, returning its document
    pub fn remove(&self, namespace: &Namespace, location: RecordLocation) -> Result<Document> {
        if !self.contains(namespace, location) {
            return Err(self.missing(namespace, location));
        }
        self.notify(namespace, &Invalidation::removed(location));

        let removed = self
            .collections
            .get_mut(namespace)
            .and_then(|mut c| c.records.remove(&location))
            .ok_or_else(|| self.missing(namespace, location))?;
        self.bump_version();
        trace!(namespace = %namespace, %location, "Removed record");
        Ok(removed.document)
    }

    fn missing(&self, namespace: &Namespace, location: RecordLocation) -> Error {
        Error::RecordNotFound {
            namespace: namespace.clone(),
            location,
        }
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Next record strictly after `position` in scan order
    ///
    /// `position == None` starts from the beginning (or the end, scanning
    /// backward). `position` need not exist any more.
    pub fn next_after(
        &self,
        namespace: &Namespace,
        position: Option<RecordLocation>,
        direction: ScanDirection,
    ) -> Option<(RecordLocation, Document)> {
        let collection = self.collections.get(namespace)?;
        let records = &collection.records;
        let found = match (direction, position) {
            (ScanDirection::Forward, None) => records.iter().next(),
            (ScanDirection::Forward, Some(p)) => records
                .range((Bound::Excluded(p), Bound::Unbounded))
                .next(),
            (ScanDirection::Backward, None) => records.iter().next_back(),
            (ScanDirection::Backward, Some(p)) => records.range(..p).next_back(),
        };
        found.map(|(loc, record)| (*loc, record.document.clone()))
    }

    /// All records of a collection in location order
    pub fn scan(&self, namespace: &Namespace) -> Vec<(RecordLocation, Document)> {
        self.collections
            .get(namespace)
            .map(|c| {
                c.records
                    .iter()
                    .map(|(loc, r)| (*loc, r.document.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("collections", &self.collections.len())
            .field("version", &self.version())
            .field("total_records", &self.total_records())
            .finish()
    }
}
