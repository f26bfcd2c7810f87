//! Coverage Stores
//!
//! The durable side of coverage. A store accepts filtered batches, merges
//! them into its aggregate with the [`MergeMode`] it declares, and returns
//! the aggregate for reporting.
//!
//! Stores keep two buckets: eager (boot-time) coverage and runtime
//! coverage. Batches tagged `Unset` go to the runtime bucket.
//!
//! Every store must merge under read-modify-write with no lost updates:
//! concurrent writers from many processes may target the same store.

mod file;
#[cfg(feature = "http")]
mod http;
mod memory;

pub use file::FileStore;
#[cfg(feature = "http")]
pub use http::{HttpStore, HttpStoreConfig, MetadataProvider};
pub use memory::MemoryStore;

use crate::coverage::{
    merge_file, merge_files, LineCoverage, MergeMode, MergedCoverage, TrackingPhase,
};
use crate::result::LinecovResult;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Batch handed to a store: path to delta or cumulative array
pub type CoverageBatch = BTreeMap<String, LineCoverage>;

/// Durable merge-save boundary
pub trait StoreAdapter: Send + Sync + Debug {
    /// Store name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether batches carry deltas to add or cumulative arrays to max
    fn merge_mode(&self) -> MergeMode;

    /// Merge a batch into the bucket for `phase`
    fn save_batch(&self, phase: TrackingPhase, batch: &CoverageBatch) -> LinecovResult<()>;

    /// Aggregate stored for `phase`
    fn load_all(&self, phase: TrackingPhase) -> LinecovResult<MergedCoverage>;

    /// Remove all coverage
    fn clear_all(&self) -> LinecovResult<()>;

    /// Remove coverage for one file from every bucket
    fn clear_file(&self, path: &str) -> LinecovResult<()>;

    /// Eager and runtime coverage combined
    ///
    /// The two buckets hold disjoint observations, so counts add.
    fn load_combined(&self) -> LinecovResult<MergedCoverage> {
        let eager = self.load_all(TrackingPhase::Eager)?;
        let runtime = self.load_all(TrackingPhase::Runtime)?;
        Ok(merge_files(&eager, &runtime, MergeMode::AddDelta))
    }

    /// Files with stored coverage for `phase`
    fn covered_files(&self, phase: TrackingPhase) -> LinecovResult<Vec<String>> {
        Ok(self.load_all(phase)?.into_keys().collect())
    }

    /// Serialized size of the combined aggregate
    fn size_bytes(&self) -> LinecovResult<usize> {
        Ok(serde_json::to_vec(&self.load_combined()?)?.len())
    }

    /// Serialized size in MiB
    fn size_in_mib(&self) -> LinecovResult<f64> {
        Ok(self.size_bytes()? as f64 / f64::from(1u32 << 20))
    }
}

/// Content identity of source files
pub trait FileHasher: Send + Sync + Debug {
    /// Hash of the file's current content; `None` when unreadable
    fn hash(&self, path: &str) -> Option<String>;
}

/// SHA-256 of file bytes, computed once per path per process
#[derive(Debug, Default)]
pub struct ContentHasher {
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl ContentHasher {
    /// Create an empty hasher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget cached hashes
    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl FileHasher for ContentHasher {
    fn hash(&self, path: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(path.to_string())
            .or_insert_with(|| {
                let bytes = std::fs::read(path).ok()?;
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                Some(format!("{:x}", hasher.finalize()))
            })
            .clone()
    }
}

/// Fixed path-to-hash table, for hosts that know content identity up front
#[derive(Debug, Clone, Default)]
pub struct MapHasher {
    hashes: HashMap<String, String>,
}

impl MapHasher {
    /// Create an empty table; unknown paths hash to `None`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hash for a path
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, hash: impl Into<String>) -> Self {
        let _ = self.hashes.insert(path.into(), hash.into());
        self
    }
}

impl FileHasher for MapHasher {
    fn hash(&self, path: &str) -> Option<String> {
        self.hashes.get(path).cloned()
    }
}

/// Merge a batch into an aggregate in place; returns inconsistent line count
pub(crate) fn apply_batch(
    merged: &mut MergedCoverage,
    batch: &CoverageBatch,
    hasher: &dyn FileHasher,
    mode: MergeMode,
    now: i64,
) -> usize {
    let mut inconsistencies = 0;
    for (path, lines) in batch {
        let hash = hasher.hash(path);
        let outcome = merge_file(merged.get(path), lines, hash.as_deref(), mode, now);
        if outcome.inconsistencies > 0 {
            tracing::debug!(
                target: "linecov.store",
                file = %path,
                lines = outcome.inconsistencies,
                "resolved NoCode/Count disagreement"
            );
        }
        inconsistencies += outcome.inconsistencies;
        let _ = merged.insert(path.clone(), outcome.record);
    }
    inconsistencies
}
