//! Stage implementations

mod collection_scan;
mod limit;
mod projection;
mod skip;
mod sort;

pub use collection_scan::CollectionScan;
pub use limit::LimitStage;
pub use projection::ProjectionStage;
pub use skip::SkipStage;
pub use sort::SortStage;
