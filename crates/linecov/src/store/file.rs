//! JSON file store
//!
//! Runtime coverage lives at `<path>`, eager coverage at `<path>.eager`.
//! Each file is a JSON object keyed by source path:
//!
//! ```text
//! { "app/dog.rb": { "data": [1, 2, null], "file_hash": "abcd",
//!                   "first_updated_at": 1541968729, "last_updated_at": 1541968729 } }
//! ```
//!
//! Writers from any number of processes, or threads of one process,
//! serialize on an exclusive `flock` of `<path>.lock`. A save reads, merges
//! and writes while holding it; the write goes to a uniquely named temporary
//! file persisted over the target, so readers never see a partial document.

use super::{apply_batch, ContentHasher, CoverageBatch, FileHasher, StoreAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::coverage::{MergeMode, MergedCoverage, TrackingPhase};
use crate::result::{LinecovError, LinecovResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const LOCK_RETRY: Duration = Duration::from_millis(5);

/// Coverage persisted as JSON files on a shared file system
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout: Duration,
    hasher: Arc<dyn FileHasher>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Create a store persisting runtime coverage at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_millis(5_000),
            hasher: Arc::new(ContentHasher::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a store using the lock budget from `config`
    #[must_use]
    pub fn from_config(path: impl Into<PathBuf>, config: &TrackerConfig) -> Self {
        Self::new(path).with_lock_timeout(Duration::from_millis(config.store_lock_timeout_ms))
    }

    /// Set how long a save waits for the lock before timing out
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
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

    /// Path of the runtime coverage file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bucket_path(&self, phase: TrackingPhase) -> PathBuf {
        if phase.is_eager() {
            with_suffix(&self.path, ".eager")
        } else {
            self.path.clone()
        }
    }

    fn lock(&self) -> LinecovResult<LockGuard> {
        LockGuard::acquire(&with_suffix(&self.path, ".lock"), self.lock_timeout)
    }

    fn read(path: &Path) -> LinecovResult<MergedCoverage> {
        match fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(MergedCoverage::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(MergedCoverage::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(path: &Path, coverage: &MergedCoverage) -> LinecovResult<()> {
        create_parent(path)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, coverage)?;
        tmp.flush()?;
        let _ = tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StoreAdapter for FileStore {
    fn name(&self) -> &'static str {
        "FileStore"
    }

    fn merge_mode(&self) -> MergeMode {
        MergeMode::AddDelta
    }

    fn save_batch(&self, phase: TrackingPhase, batch: &CoverageBatch) -> LinecovResult<()> {
        let _guard = self.lock()?;
        let path = self.bucket_path(phase);
        let mut merged = Self::read(&path)?;
        let inconsistencies = apply_batch(
            &mut merged,
            batch,
            self.hasher.as_ref(),
            MergeMode::AddDelta,
            self.clock.now(),
        );
        Self::write(&path, &merged)?;
        tracing::debug!(
            target: "linecov.store",
            path = %path.display(),
            files = batch.len(),
            inconsistencies,
            "saved coverage batch"
        );
        Ok(())
    }

    fn load_all(&self, phase: TrackingPhase) -> LinecovResult<MergedCoverage> {
        Self::read(&self.bucket_path(phase))
    }

    fn clear_all(&self) -> LinecovResult<()> {
        let _guard = self.lock()?;
        for phase in [TrackingPhase::Runtime, TrackingPhase::Eager] {
            match fs::remove_file(self.bucket_path(phase)) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }

    fn clear_file(&self, path: &str) -> LinecovResult<()> {
        let _guard = self.lock()?;
        for phase in [TrackingPhase::Runtime, TrackingPhase::Eager] {
            let bucket = self.bucket_path(phase);
            let mut merged = Self::read(&bucket)?;
            if merged.remove(path).is_some() {
                Self::write(&bucket, &merged)?;
            }
        }
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive advisory lock on `<path>.lock`, released when dropped
///
/// The lock file itself is never deleted; the OS drops the lock when its
/// holder closes the handle or exits.
#[derive(Debug)]
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path, timeout: Duration) -> LinecovResult<Self> {
        create_parent(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= timeout {
                        tracing::warn!(
                            target: "linecov.store",
                            path = %path.display(),
                            timeout_ms = timeout.as_millis() as u64,
                            "store lock still held by another writer"
                        );
                        return Err(LinecovError::Timeout {
                            ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn create_parent(path: &Path) -> LinecovResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
