//! In-memory store
//!
//! Shared by every thread of one process. Merges happen under a single
//! mutex, which is the read-modify-write guarantee for this store.

use super::{apply_batch, ContentHasher, CoverageBatch, FileHasher, StoreAdapter};
use crate::clock::{Clock, SystemClock};
use crate::coverage::{MergeMode, MergedCoverage, TrackingPhase};
use crate::result::LinecovResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Buckets {
    eager: MergedCoverage,
    runtime: MergedCoverage,
}

impl Buckets {
    fn bucket(&mut self, phase: TrackingPhase) -> &mut MergedCoverage {
        if phase.is_eager() {
            &mut self.eager
        } else {
            &mut self.runtime
        }
    }
}

/// Mutex-guarded in-process store
#[derive(Debug)]
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
    mode: MergeMode,
    hasher: Arc<dyn FileHasher>,
    clock: Arc<dyn Clock>,
    saves: AtomicU64,
}

impl MemoryStore {
    /// Create a delta-merging store hashing real file content
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(MergeMode::AddDelta)
    }

    /// Create a store with an explicit merge contract
    #[must_use]
    pub fn with_mode(mode: MergeMode) -> Self {
        Self {
            buckets: Mutex::new(Buckets::default()),
            mode,
            hasher: Arc::new(ContentHasher::new()),
            clock: Arc::new(SystemClock),
            saves: AtomicU64::new(0),
        }
    }

    /// Use a different content hasher
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Use a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of batches saved
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreAdapter for MemoryStore {
    fn name(&self) -> &'static str {
        "MemoryStore"
    }

    fn merge_mode(&self) -> MergeMode {
        self.mode
    }

    fn save_batch(&self, phase: TrackingPhase, batch: &CoverageBatch) -> LinecovResult<()> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let _ = apply_batch(buckets.bucket(phase), batch, self.hasher.as_ref(), self.mode, now);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load_all(&self, phase: TrackingPhase) -> LinecovResult<MergedCoverage> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.bucket(phase).clone())
    }

    fn clear_all(&self) -> LinecovResult<()> {
        *self.buckets.lock().unwrap_or_else(PoisonError::into_inner) = Buckets::default();
        Ok(())
    }

    fn clear_file(&self, path: &str) -> LinecovResult<()> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = buckets.eager.remove(path);
        let _ = buckets.runtime.remove(path);
        Ok(())
    }
}
