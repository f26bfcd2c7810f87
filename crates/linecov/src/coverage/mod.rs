//! Line Coverage Tracking
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  LINECOV FLUSH PATH                                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  RuntimeProbe → DeltaTracker → FileClassifier → StoreAdapter     │
//! │   (atomics)      (since last)    (ignore/root)    (merge-save)   │
//! │                                                       ↓          │
//! │  CoverageReport ← MergeEngine ← StoreAdapter::load_combined      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Toyota Way Principles Applied
//!
//! - **Poka-Yoke**: `LineHits` keeps "not code" and "zero hits" apart; `MergeMode` is explicit
//! - **Muda**: Unchanged and ignored files never reach the store
//! - **Jidoka**: Production swallows flush failures, test mode stops the line

mod background;
mod classifier;
mod collector;
mod delta;
mod line;
mod merge;
mod phase;
mod policy;
mod probe;
mod report;

pub use background::BackgroundReporter;
pub use classifier::{FileClass, FileClassifier};
pub use collector::{CoverageCollector, CoverageCollectorBuilder, FlushSummary};
pub use delta::DeltaTracker;
pub use line::{Delta, LineCoverage, LineHits, Snapshot};
pub use merge::{
    combine_lines, merge_file, merge_files, FileRecord, MergeMode, MergeOutcome, MergedCoverage,
};
pub use phase::{CollectorState, TrackingPhase};
pub use policy::{policy_for, ErrorPolicy, LogAndContinue, Propagate};
pub use probe::{CounterProbe, FileCounters, RuntimeProbe};
pub use report::{CoverageReport, CoverageSummary, FileSummary};
