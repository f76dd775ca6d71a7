//! Working set: the in-flight results shared by a stage tree
//!
//! Stages hand results to each other as [`WorkingSetId`]s. A member is in
//! one of three states:
//!
//! | State | Location | Document | Meaning |
//! |-------|----------|----------|---------|
//! | `LocAndDoc` | yes | yes | record plus a snapshot read under current access |
//! | `LocOnly` | yes | no | yield-safe form; document must be fetched again |
//! | `OwnedDoc` | no | yes | computed document not tied to storage |
//!
//! A `LocAndDoc` snapshot is only trusted while shared access is held; on a
//! yield it is dropped back to `LocOnly`, keeping the record's `_id` so the
//! fetch after resuming can verify the location still holds the same record.

use serde_json::Value;
use strata_core::{Document, Namespace, RecordLocation};
use strata_storage::RecordStore;

/// Handle to a working set member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkingSetId(usize);

impl WorkingSetId {
    /// Slot index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// See the module docs for the state table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    /// Location plus document snapshot
    LocAndDoc,
    /// Location only, document must be fetched
    LocOnly,
    /// Document only
    OwnedDoc,
}

/// One in-flight result
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSetMember {
    location: Option<RecordLocation>,
    document: Option<Document>,
    record_id: Option<Value>,
}

impl WorkingSetMember {
    /// Member for a record just read from storage
    pub fn from_record(location: RecordLocation, document: Document) -> Self {
        Self {
            location: Some(location),
            record_id: document.id().cloned(),
            document: Some(document),
        }
    }

    /// Member for a computed document
    pub fn owned(document: Document) -> Self {
        Self {
            location: None,
            document: Some(document),
            record_id: None,
        }
    }

    /// Current state
    pub fn state(&self) -> MemberState {
        match (&self.location, &self.document) {
            (Some(_), Some(_)) => MemberState::LocAndDoc,
            (Some(_), None) => MemberState::LocOnly,
            (None, _) => MemberState::OwnedDoc,
        }
    }

    /// Record location, if still tied to storage
    pub fn location(&self) -> Option<RecordLocation> {
        self.location
    }

    /// Document, if present
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// `_id` of the record this member was read from
    pub fn record_id(&self) -> Option<&Value> {
        self.record_id.as_ref()
    }

    /// Consume into the document
    pub fn into_document(self) -> Option<Document> {
        self.document
    }

    /// Replace the content with a computed document, detaching from storage
    pub fn set_owned(&mut self, document: Document) {
        self.location = None;
        self.record_id = None;
        self.document = Some(document);
    }

    /// Drop the snapshot of a storage-backed member (`LocAndDoc -> LocOnly`)
    ///
    /// Owned members keep their document.
    pub fn release_document(&mut self) {
        if self.location.is_some() {
            self.document = None;
        }
    }

    /// Follow a moved record: point at `to` and fetch again later
    pub fn relocate(&mut self, to: RecordLocation) {
        self.location = Some(to);
        self.document = None;
    }

    /// Make sure the member has a document, reading storage if needed
    ///
    /// Returns false when a `LocOnly` member can no longer be resolved: the
    /// location is empty, or holds a record with a different `_id`.
    pub fn fetch(&mut self, store: &RecordStore, namespace: &Namespace) -> bool {
        if self.document.is_some() {
            return true;
        }
        let Some(location) = self.location else {
            return false;
        };
        let Some(document) = store.get(namespace, location) else {
            return false;
        };
        if self.record_id.is_some() && document.id() != self.record_id.as_ref() {
            return false;
        }
        self.document = Some(document);
        true
    }
}

/// Slab of members with a free list
#[derive(Debug, Default)]
pub struct WorkingSet {
    members: Vec<Option<WorkingSetMember>>,
    free: Vec<usize>,
}

impl WorkingSet {
    /// Create an empty working set
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a member, returning its id
    pub fn allocate(&mut self, member: WorkingSetMember) -> WorkingSetId {
        match self.free.pop() {
            Some(slot) => {
                self.members[slot] = Some(member);
                WorkingSetId(slot)
            }
            None => {
                self.members.push(Some(member));
                WorkingSetId(self.members.len() - 1)
            }
        }
    }

    /// Borrow a member
    pub fn get(&self, id: WorkingSetId) -> Option<&WorkingSetMember> {
        self.members.get(id.0).and_then(Option::as_ref)
    }

    /// Mutably borrow a member
    pub fn get_mut(&mut self, id: WorkingSetId) -> Option<&mut WorkingSetMember> {
        self.members.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Remove a member and return it
    pub fn take(&mut self, id: WorkingSetId) -> Option<WorkingSetMember> {
        let member = self.members.get_mut(id.0).and_then(Option::take);
        if member.is_some() {
            self.free.push(id.0);
        }
        member
    }

    /// Remove a member
    pub fn free(&mut self, id: WorkingSetId) {
        self.take(id);
    }

    /// Remove every member
    ///
    /// Ids handed out before the call no longer resolve.
    pub fn clear(&mut self) {
        self.members.clear();
        self.free.clear();
    }

    /// Number of live members
    pub fn len(&self) -> usize {
        self.members.len() - self.free.len()
    }

    /// Check if no member is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
