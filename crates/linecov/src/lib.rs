//! Linecov: production line coverage with mergeable deltas
//!
//! Tracks which source lines a running program executes, turns the
//! runtime's cumulative counters into per-flush deltas, and merges them
//! into a store shared by every process of a deployment.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    LINECOV Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Runtime    │    │ Coverage   │    │ Shared     │            │
//! │   │ Probe      │───►│ Collector  │───►│ Store      │            │
//! │   │ (counters) │    │ (deltas)   │    │ (merged)   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use linecov::{
//!     CounterProbe, CoverageCollector, MemoryStore, StoreAdapter, TrackerConfig, TrackingPhase,
//! };
//! use std::sync::Arc;
//!
//! let probe = Arc::new(CounterProbe::new());
//! let store = Arc::new(MemoryStore::new());
//! let collector = CoverageCollector::builder()
//!     .config(TrackerConfig::builder().root("/srv/app").build())
//!     .probe(probe.clone())
//!     .store(store.clone())
//!     .build()
//!     .unwrap();
//!
//! let user = probe.register_file("/srv/app/user.rs", [false, true, true]);
//! user.hit(2);
//! collector.runtime().unwrap();
//! collector.report_coverage().unwrap();
//!
//! let merged = store.load_all(TrackingPhase::Runtime).unwrap();
//! assert_eq!(merged["/srv/app/user.rs"].data.covered_lines(), 1);
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod coverage;
pub mod logging;
mod result;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GroupRule, TrackerConfig, TrackerConfigBuilder, IGNORE_DEFAULTS};
pub use coverage::{
    BackgroundReporter, CollectorState, CounterProbe, CoverageCollector, CoverageReport,
    CoverageSummary, Delta, DeltaTracker, ErrorPolicy, FileClass, FileClassifier, FileCounters,
    FileRecord, FileSummary, FlushSummary, LineCoverage, LineHits, LogAndContinue, MergeMode,
    MergedCoverage, Propagate, RuntimeProbe, Snapshot, TrackingPhase,
};
pub use result::{LinecovError, LinecovResult};
pub use store::{
    ContentHasher, CoverageBatch, FileHasher, FileStore, MapHasher, MemoryStore, StoreAdapter,
};

/// Build a report over everything the collector's store holds
pub fn combined_report(collector: &CoverageCollector) -> LinecovResult<CoverageReport> {
    let merged = collector.store().load_combined()?;
    Ok(CoverageReport::build(&merged, &collector.classifier()))
}
