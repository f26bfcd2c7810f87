//! Coverage Collector
//!
//! One collector per process. It reads the probe, turns the snapshot into a
//! delta, filters it, and hands the batch to the store. The whole flush
//! runs under the collector's lock so two threads never advance the
//! previous snapshot at the same time.

use super::{
    policy_for, CollectorState, CounterProbe, DeltaTracker, ErrorPolicy, FileClassifier,
    MergeMode, RuntimeProbe, TrackingPhase,
};
use crate::config::TrackerConfig;
use crate::result::{LinecovError, LinecovResult};
use crate::store::{CoverageBatch, StoreAdapter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    /// Phase the batch was tagged with
    pub phase: TrackingPhase,
    /// Files handed to the store
    pub reported: usize,
    /// Files dropped by classification
    pub ignored: usize,
    /// Tracked files with no new hits
    pub unchanged: usize,
    /// Whether the store accepted the batch
    pub persisted: bool,
}

impl FlushSummary {
    fn new(phase: TrackingPhase) -> Self {
        Self {
            phase,
            reported: 0,
            ignored: 0,
            unchanged: 0,
            persisted: false,
        }
    }
}

#[derive(Debug)]
struct CollectorInner {
    config: TrackerConfig,
    classifier: FileClassifier,
    tracker: DeltaTracker,
    state: CollectorState,
}

/// Process-wide coverage collector
#[derive(Debug)]
pub struct CoverageCollector {
    inner: Mutex<CollectorInner>,
    probe: Arc<dyn RuntimeProbe>,
    store: Arc<dyn StoreAdapter>,
    policy: Arc<dyn ErrorPolicy>,
}

impl CoverageCollector {
    /// Create a builder
    #[must_use]
    pub fn builder() -> CoverageCollectorBuilder {
        CoverageCollectorBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> CollectorState {
        self.lock().state
    }

    /// Phase the next flush will be tagged with
    #[must_use]
    pub fn phase(&self) -> TrackingPhase {
        self.lock().state.phase()
    }

    /// Enter the eager-loading phase; only valid before runtime
    pub fn eager_loading(&self) -> LinecovResult<()> {
        self.transition(CollectorState::Eager)
    }

    /// Enter the runtime phase
    pub fn runtime(&self) -> LinecovResult<()> {
        self.transition(CollectorState::Runtime)
    }

    fn transition(&self, next: CollectorState) -> LinecovResult<()> {
        let mut inner = self.lock();
        if !inner.state.can_enter(next) {
            return Err(LinecovError::InvalidPhaseTransition {
                from: inner.state.as_str(),
                to: next.as_str(),
            });
        }
        if inner.state != next {
            tracing::info!(
                target: "linecov.collector",
                from = inner.state.as_str(),
                to = next.as_str(),
                "tracking phase changed"
            );
        }
        inner.state = next;
        Ok(())
    }

    /// Compute, filter and persist coverage accrued since the last flush
    ///
    /// Store failures go through the error policy: swallowed in production,
    /// returned under test mode.
    pub fn report_coverage(&self) -> LinecovResult<FlushSummary> {
        let mut inner = self.lock();
        let mode = self.store.merge_mode();
        let (mut summary, batch) = collect_batch(&mut inner, self.probe.as_ref(), mode);
        if batch.is_empty() {
            return Ok(summary);
        }

        match self.store.save_batch(summary.phase, &batch) {
            Ok(()) => {
                summary.persisted = true;
                tracing::debug!(
                    target: "linecov.collector",
                    store = self.store.name(),
                    phase = %summary.phase,
                    files = summary.reported,
                    "reported coverage"
                );
                Ok(summary)
            }
            Err(error) => {
                self.policy.on_failure(error)?;
                Ok(summary)
            }
        }
    }

    /// Recompile classification rules and forget the previous snapshot
    pub fn reset(&self) -> LinecovResult<()> {
        let mut inner = self.lock();
        inner.classifier = FileClassifier::new(&inner.config)?;
        inner.tracker.reset();
        Ok(())
    }

    /// Replace the configuration, then reset
    pub fn reconfigure(&self, config: TrackerConfig) -> LinecovResult<()> {
        let classifier = FileClassifier::new(&config)?;
        let mut inner = self.lock();
        inner.config = config;
        inner.classifier = classifier;
        inner.tracker.reset();
        Ok(())
    }

    /// Final flush when `report_on_exit` is set
    pub fn shutdown(&self) -> LinecovResult<Option<FlushSummary>> {
        if self.config().report_on_exit {
            self.report_coverage().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> TrackerConfig {
        self.lock().config.clone()
    }

    /// Current classification rules
    #[must_use]
    pub fn classifier(&self) -> FileClassifier {
        self.lock().classifier.clone()
    }

    /// The store batches are persisted to
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StoreAdapter> {
        &self.store
    }

    /// The probe snapshots are read from
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn RuntimeProbe> {
        &self.probe
    }
}

/// Build the batch for one flush
///
/// Add-delta stores receive the delta; max-cumulative stores receive the
/// cumulative array. Either way a file is only sent when its delta has a
/// nonzero entry.
fn collect_batch(
    inner: &mut CollectorInner,
    probe: &dyn RuntimeProbe,
    mode: MergeMode,
) -> (FlushSummary, CoverageBatch) {
    let mut summary = FlushSummary::new(inner.state.phase());
    let delta = inner.tracker.compute_delta(probe.current_snapshot());
    let mut batch = CoverageBatch::new();

    for (path, lines) in delta {
        if !inner.classifier.is_tracked(&path) {
            summary.ignored += 1;
            continue;
        }
        if !lines.has_hits() {
            summary.unchanged += 1;
            continue;
        }
        let payload = match mode {
            MergeMode::AddDelta => lines,
            MergeMode::MaxCumulative => inner.tracker.previous(&path).cloned().unwrap_or(lines),
        };
        let _ = batch.insert(path, payload);
    }
    summary.reported = batch.len();
    (summary, batch)
}

/// Builder for [`CoverageCollector`]
#[derive(Debug, Default)]
pub struct CoverageCollectorBuilder {
    config: Option<TrackerConfig>,
    store: Option<Arc<dyn StoreAdapter>>,
    probe: Option<Arc<dyn RuntimeProbe>>,
    policy: Option<Arc<dyn ErrorPolicy>>,
}

impl CoverageCollectorBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the store (required)
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StoreAdapter>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the probe; defaults to a fresh [`CounterProbe`]
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn RuntimeProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Override the policy implied by `test_mode`
    #[must_use]
    pub fn error_policy(mut self, policy: Arc<dyn ErrorPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the collector and make sure the probe is running
    pub fn build(self) -> LinecovResult<CoverageCollector> {
        let store = self
            .store
            .ok_or_else(|| LinecovError::config("no coverage store set"))?;
        let config = self.config.unwrap_or_default();
        let classifier = FileClassifier::new(&config)?;
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(CounterProbe::new()));
        let policy = self.policy.unwrap_or_else(|| policy_for(&config));

        probe.resume();
        tracing::info!(
            target: "linecov.collector",
            store = store.name(),
            mode = ?store.merge_mode(),
            root = %config.root.display(),
            "coverage collector ready"
        );

        Ok(CoverageCollector {
            inner: Mutex::new(CollectorInner {
                config,
                classifier,
                tracker: DeltaTracker::new(),
                state: CollectorState::Uninitialized,
            }),
            probe,
            store,
            policy,
        })
    }
}
