//! Blocking sort
//!
//! Buffers every child result, sorts once the child reaches end of stream,
//! then hands results out one per `work` call. Buffered members are the
//! longest-lived storage references in a plan, so this stage carries most
//! of the yield and invalidation handling:
//!
//! - on yield, buffered snapshots are dropped (`LocAndDoc -> LocOnly`)
//! - on `Removed`, members at that location are freed
//! - on `Moved`, members follow the record to its new location
//! - before sorting and before returning, `LocOnly` members are fetched
//!   again; those whose record is gone or replaced are dropped, as are
//!   those whose new content no longer passes the scan's filter

use crate::stage::{BoxedStage, PlanStage, StageState};
use crate::stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
use crate::working_set::{MemberState, WorkingSet, WorkingSetId};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use strata_core::{Invalidation, InvalidationKind, Namespace, Predicate, SortSpec};
use strata_storage::RecordStore;

/// Sort stage
pub struct SortStage {
    child: BoxedStage,
    store: Arc<RecordStore>,
    namespace: Namespace,
    pattern: SortSpec,
    filter: Option<Predicate>,
    buffer: Vec<WorkingSetId>,
    results: VecDeque<WorkingSetId>,
    sorted: bool,
    common: CommonStats,
    buffered: u64,
    dropped: u64,
    refetched: u64,
}

impl SortStage {
    /// Sort the output of `child` by `pattern`
    ///
    /// `namespace` is the collection the child's records live in; it is
    /// used to fetch records again after a yield.
    pub fn new(
        child: BoxedStage,
        store: Arc<RecordStore>,
        namespace: Namespace,
        pattern: SortSpec,
    ) -> Self {
        Self {
            child,
            store,
            namespace,
            pattern,
            filter: None,
            buffer: Vec::new(),
            results: VecDeque::new(),
            sorted: false,
            common: CommonStats::default(),
            buffered: 0,
            dropped: 0,
            refetched: 0,
        }
    }

    /// Predicate the child's results were selected by
    ///
    /// Records fetched again after a yield or a move are checked against
    /// it, since their content may have changed since the child tested it.
    pub fn with_filter(mut self, filter: Option<Predicate>) -> Self {
        self.filter = filter;
        self
    }

    /// Make sure a member has its document; frees it if it cannot
    fn ensure_fetched(&mut self, ws: &mut WorkingSet, id: WorkingSetId) -> bool {
        let Some(member) = ws.get_mut(id) else {
            return false;
        };
        if member.state() != MemberState::LocOnly {
            return true;
        }
        self.refetched += 1;
        let keep = member.fetch(&self.store, &self.namespace)
            && match (&self.filter, member.document()) {
                (Some(filter), Some(doc)) => filter.matches(doc),
                _ => true,
            };
        if !keep {
            ws.free(id);
            self.dropped += 1;
        }
        keep
    }

    fn sort_buffer(&mut self, ws: &mut WorkingSet) {
        let mut ids = std::mem::take(&mut self.buffer);
        ids.retain(|&id| self.ensure_fetched(ws, id));

        let pattern = &self.pattern;
        // Stable, so ties keep scan order
        ids.sort_by(|&a, &b| {
            match (
                ws.get(a).and_then(|m| m.document()),
                ws.get(b).and_then(|m| m.document()),
            ) {
                (Some(x), Some(y)) => pattern.compare(x, y),
                _ => Ordering::Equal,
            }
        });
        self.results = ids.into();
        self.sorted = true;
    }
}

/// Apply an invalidation to one buffered member; returns whether to keep it
fn invalidate_member(ws: &mut WorkingSet, id: WorkingSetId, invalidation: &Invalidation) -> bool {
    let Some(member) = ws.get_mut(id) else {
        return false;
    };
    if member.location() != Some(invalidation.location) {
        return true;
    }
    match invalidation.kind {
        InvalidationKind::Removed => {
            ws.free(id);
            false
        }
        InvalidationKind::Moved { to } => {
            member.relocate(to);
            true
        }
    }
}

impl PlanStage for SortStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.common.works += 1;

        if !self.sorted {
            return match self.child.work(ws) {
                StageState::Advanced(id) => {
                    self.buffer.push(id);
                    self.buffered += 1;
                    self.common.need_time += 1;
                    StageState::NeedTime
                }
                StageState::NeedTime => {
                    self.common.need_time += 1;
                    StageState::NeedTime
                }
                StageState::IsEof => {
                    self.sort_buffer(ws);
                    self.common.need_time += 1;
                    StageState::NeedTime
                }
                StageState::Failure(e) => StageState::Failure(e),
            };
        }

        while let Some(id) = self.results.pop_front() {
            if self.ensure_fetched(ws, id) {
                self.common.advanced += 1;
                return StageState::Advanced(id);
            }
        }
        self.common.is_eof = true;
        StageState::IsEof
    }

    fn is_eof(&self) -> bool {
        self.sorted && self.results.is_empty()
    }

    fn prepare_to_yield(&mut self, ws: &mut WorkingSet) {
        self.common.yields += 1;
        self.child.prepare_to_yield(ws);
        for &id in self.buffer.iter().chain(self.results.iter()) {
            if let Some(member) = ws.get_mut(id) {
                member.release_document();
            }
        }
    }

    fn recover_from_yield(&mut self, ws: &mut WorkingSet) {
        self.common.unyields += 1;
        self.child.recover_from_yield(ws);
    }

    fn invalidate(&mut self, ws: &mut WorkingSet, invalidation: &Invalidation) {
        self.common.invalidates += 1;
        self.child.invalidate(ws, invalidation);

        let before = self.buffer.len() + self.results.len();
        self.buffer.retain(|&id| invalidate_member(ws, id, invalidation));
        self.results.retain(|&id| invalidate_member(ws, id, invalidation));
        self.dropped += (before - self.buffer.len() - self.results.len()) as u64;
    }

    fn stats(&self) -> PlanStageStats {
        PlanStageStats::with_child(
            StageType::Sort,
            self.common.clone(),
            SpecificStats::Sort {
                buffered: self.buffered,
                dropped: self.dropped,
                refetched: self.refetched,
            },
            self.child.stats(),
        )
    }

    fn stage_type(&self) -> StageType {
        StageType::Sort
    }
}
