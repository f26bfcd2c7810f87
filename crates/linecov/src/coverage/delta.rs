//! Delta Tracking
//!
//! Holds the last observed cumulative snapshot and turns each new snapshot
//! into hits accrued since the previous call.

use super::{Delta, LineCoverage, LineHits, Snapshot};

/// Computes per-file deltas between consecutive probe snapshots
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: Snapshot,
    samples: u64,
}

impl DeltaTracker {
    /// Create a tracker with no previous observation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the delta of `current` against the previous snapshot
    ///
    /// The previous snapshot is replaced with `current` afterwards, so each
    /// call reports only what happened since the last one.
    pub fn compute_delta(&mut self, current: Snapshot) -> Delta {
        let delta = current
            .iter()
            .map(|(path, lines)| {
                let diff = match self.previous.get(path) {
                    Some(previous) => line_delta(previous, lines),
                    None => lines.clone(),
                };
                (path.clone(), diff)
            })
            .collect();
        self.previous = current;
        self.samples += 1;
        delta
    }

    /// Cumulative array last observed for a file
    #[must_use]
    pub fn previous(&self, path: &str) -> Option<&LineCoverage> {
        self.previous.get(path)
    }

    /// Forget the previous snapshot; the next sample counts as first observation
    pub fn reset(&mut self) {
        self.previous.clear();
        self.samples = 0;
    }

    /// Number of samples taken since creation or reset
    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Line-by-line difference of two cumulative arrays for one file
///
/// A shorter current array, or any count that went backwards, means the
/// probe restarted counting for the file; the current array is then a first
/// observation. A line that was `NoCode` before counts from zero.
fn line_delta(previous: &LineCoverage, current: &LineCoverage) -> LineCoverage {
    if current.len() < previous.len() {
        return current.clone();
    }
    let prev = previous.as_slice();
    let mut out = Vec::with_capacity(current.len());
    for (idx, line) in current.iter().enumerate() {
        match (*line, prev.get(idx).and_then(|p| p.count())) {
            (LineHits::NoCode, _) => out.push(LineHits::NoCode),
            (LineHits::Count(now), Some(before)) if now < before => return current.clone(),
            (LineHits::Count(now), before) => out.push(LineHits::Count(now - before.unwrap_or(0))),
        }
    }
    LineCoverage::new(out)
}
