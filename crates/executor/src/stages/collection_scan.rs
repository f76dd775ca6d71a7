//! Full collection walk in record-location order

use crate::stage::{PlanStage, StageState};
use crate::stats::{CommonStats, PlanStageStats, SpecificStats, StageType};
use crate::working_set::{WorkingSet, WorkingSetMember};
use std::sync::Arc;
use strata_core::{Error, Invalidation, Namespace, Predicate, RecordLocation, ScanDirection};
use strata_storage::RecordStore;
use tracing::debug;

/// Walks a collection one record per `work` call
///
/// The scan position is the last location examined. Resuming asks the
/// store for the next location strictly after it, so the position stays
/// valid even if that record is removed while the scan is suspended.
/// A record moved to a location the scan has yet to reach is seen again.
pub struct CollectionScan {
    store: Arc<RecordStore>,
    namespace: Namespace,
    direction: ScanDirection,
    filter: Option<Predicate>,
    position: Option<RecordLocation>,
    eof: bool,
    collection_lost: bool,
    common: CommonStats,
    docs_tested: u64,
}

impl CollectionScan {
    /// Scan `namespace` in `direction`, keeping records matching `filter`
    pub fn new(
        store: Arc<RecordStore>,
        namespace: Namespace,
        direction: ScanDirection,
        filter: Option<Predicate>,
    ) -> Self {
        Self {
            store,
            namespace,
            direction,
            filter,
            position: None,
            eof: false,
            collection_lost: false,
            common: CommonStats::default(),
            docs_tested: 0,
        }
    }

    /// Collection being scanned
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn hit_eof(&mut self) -> StageState {
        self.eof = true;
        self.common.is_eof = true;
        StageState::IsEof
    }
}

impl PlanStage for CollectionScan {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.common.works += 1;
        if self.eof {
            return StageState::IsEof;
        }
        if self.collection_lost {
            self.eof = true;
            return StageState::Failure(Error::NamespaceNotFound(self.namespace.clone()));
        }

        let Some((location, document)) =
            self.store
                .next_after(&self.namespace, self.position, self.direction)
        else {
            return self.hit_eof();
        };
        self.position = Some(location);
        self.docs_tested += 1;

        let keep = self.filter.as_ref().map_or(true, |f| f.matches(&document));
        if keep {
            self.common.advanced += 1;
            StageState::Advanced(ws.allocate(WorkingSetMember::from_record(location, document)))
        } else {
            self.common.need_time += 1;
            StageState::NeedTime
        }
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn prepare_to_yield(&mut self, _ws: &mut WorkingSet) {
        self.common.yields += 1;
    }

    fn recover_from_yield(&mut self, _ws: &mut WorkingSet) {
        self.common.unyields += 1;
        // A scan that had started cannot silently continue on a collection
        // dropped underneath it.
        if self.position.is_some() && !self.eof && !self.store.has_collection(&self.namespace) {
            debug!(namespace = %self.namespace, "Collection dropped during yield");
            self.collection_lost = true;
        }
    }

    fn invalidate(&mut self, _ws: &mut WorkingSet, _invalidation: &Invalidation) {
        self.common.invalidates += 1;
    }

    fn stats(&self) -> PlanStageStats {
        PlanStageStats::leaf(
            StageType::CollectionScan,
            self.common.clone(),
            SpecificStats::CollectionScan {
                docs_tested: self.docs_tested,
            },
        )
    }

    fn stage_type(&self) -> StageType {
        StageType::CollectionScan
    }
}
