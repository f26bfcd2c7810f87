//! Runtime Line Probe
//!
//! The probe is the runtime side of coverage: it owns cumulative per-line
//! counters that instrumented code bumps as it runs. The collector only
//! reads snapshots from it.
//!
//! [`CounterProbe`] is the in-process implementation for Rust hosts. Each
//! registered file gets a fixed array of atomic counters; the hot path is a
//! single relaxed `fetch_add` with no lock and no allocation.

use super::{LineCoverage, LineHits, Snapshot};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of cumulative per-file line hit counts
pub trait RuntimeProbe: Send + Sync + Debug {
    /// Begin counting; counts restart from zero
    fn start(&self);

    /// Whether counting is active
    fn running(&self) -> bool;

    /// Cumulative counts since the last start
    fn current_snapshot(&self) -> Snapshot;

    /// Start counting unless already running
    fn resume(&self) {
        if !self.running() {
            self.start();
        }
    }
}

/// Counters for a single registered file
#[derive(Debug)]
pub struct FileCounters {
    path: String,
    /// One slot per line; `None` marks non-executable lines
    lines: Vec<Option<AtomicU64>>,
    enabled: Arc<AtomicBool>,
}

impl FileCounters {
    /// Record one execution of a 1-indexed line
    ///
    /// Returns `false` when the line is out of range, not executable, or the
    /// probe is not running.
    #[inline(always)]
    pub fn hit(&self, line_number: usize) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        match line_number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
        {
            Some(Some(counter)) => {
                counter.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Current cumulative count of a 1-indexed line
    #[must_use]
    pub fn count(&self, line_number: usize) -> Option<u64> {
        line_number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .and_then(|slot| slot.as_ref())
            .map(|counter| counter.load(Ordering::Relaxed))
    }

    /// Path the counters belong to
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn executable_mask(&self) -> impl Iterator<Item = bool> + '_ {
        self.lines.iter().map(Option::is_some)
    }

    fn read(&self) -> LineCoverage {
        self.lines
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .map_or(LineHits::NoCode, |c| LineHits::Count(c.load(Ordering::Relaxed)))
            })
            .collect()
    }

    fn zero(&self) {
        for counter in self.lines.iter().flatten() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// In-process probe backed by atomic per-line counters
#[derive(Debug, Default)]
pub struct CounterProbe {
    files: RwLock<HashMap<String, Arc<FileCounters>>>,
    running: Arc<AtomicBool>,
}

impl CounterProbe {
    /// Create a stopped probe with no files
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file by its executable-line mask, one entry per line
    ///
    /// Registering the same path with the same mask returns the existing
    /// counters. A different mask means the file changed; its counters are
    /// replaced.
    pub fn register_file<I>(&self, path: impl Into<String>, executable: I) -> Arc<FileCounters>
    where
        I: IntoIterator<Item = bool>,
    {
        let path = path.into();
        let mask: Vec<bool> = executable.into_iter().collect();
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = files.get(&path) {
            if existing.executable_mask().eq(mask.iter().copied()) {
                return Arc::clone(existing);
            }
        }

        let counters = Arc::new(FileCounters {
            path: path.clone(),
            lines: mask
                .into_iter()
                .map(|code| code.then(|| AtomicU64::new(0)))
                .collect(),
            enabled: Arc::clone(&self.running),
        });
        let _ = files.insert(path, Arc::clone(&counters));
        counters
    }

    /// Counters of a registered file
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Arc<FileCounters>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Number of registered files
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl RuntimeProbe for CounterProbe {
    fn start(&self) {
        for counters in self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            counters.zero();
        }
        self.running.store(true, Ordering::SeqCst);
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn current_snapshot(&self) -> Snapshot {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(path, counters)| (path.clone(), counters.read()))
            .collect()
    }
}
