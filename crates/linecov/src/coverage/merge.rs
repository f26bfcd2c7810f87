//! Merge Engine
//!
//! Folds incoming per-file coverage into the durable aggregate. Whether the
//! incoming array is a delta to add or a cumulative snapshot to max against
//! is never inferred: every call names its [`MergeMode`].

use super::{LineCoverage, LineHits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How incoming counts combine with recorded counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Incoming counts accrued since the last sample; add them
    AddDelta,
    /// Incoming counts are cumulative for the same phase; keep the larger
    MaxCumulative,
}

impl MergeMode {
    #[inline]
    fn combine(self, recorded: u64, incoming: u64) -> u64 {
        match self {
            Self::AddDelta => recorded.saturating_add(incoming),
            Self::MaxCumulative => recorded.max(incoming),
        }
    }
}

/// Durable coverage record for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Cumulative per-line coverage
    pub data: LineCoverage,
    /// Hash of the file content the data was recorded against
    pub file_hash: Option<String>,
    /// When the record was created (Unix seconds)
    pub first_updated_at: i64,
    /// When the data last changed (Unix seconds)
    pub last_updated_at: i64,
}

impl FileRecord {
    /// Create a fresh record
    #[must_use]
    pub fn new(data: LineCoverage, file_hash: Option<String>, now: i64) -> Self {
        Self {
            data,
            file_hash,
            first_updated_at: now,
            last_updated_at: now,
        }
    }
}

/// Durable aggregate keyed by file path
pub type MergedCoverage = BTreeMap<String, FileRecord>;

/// Result of merging one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged record
    pub record: FileRecord,
    /// Lines whose NoCode/Count status disagreed and were resolved to Count
    pub inconsistencies: usize,
    /// Whether the recorded data changed
    pub changed: bool,
    /// Whether a content hash change discarded the previous history
    pub reset: bool,
}

/// Merge incoming coverage for one file into its existing record
///
/// An absent record, or one recorded against different file content, is
/// replaced by the incoming data with both timestamps set to `now`.
#[must_use]
pub fn merge_file(
    existing: Option<&FileRecord>,
    incoming: &LineCoverage,
    incoming_hash: Option<&str>,
    mode: MergeMode,
    now: i64,
) -> MergeOutcome {
    let Some(existing) = existing else {
        return MergeOutcome {
            record: FileRecord::new(incoming.clone(), incoming_hash.map(String::from), now),
            inconsistencies: 0,
            changed: true,
            reset: false,
        };
    };

    if existing.file_hash.as_deref() != incoming_hash {
        tracing::debug!(
            target: "linecov.merge",
            previous = ?existing.file_hash,
            current = ?incoming_hash,
            "file content changed, discarding coverage history"
        );
        return MergeOutcome {
            record: FileRecord::new(incoming.clone(), incoming_hash.map(String::from), now),
            inconsistencies: 0,
            changed: true,
            reset: true,
        };
    }

    let (data, inconsistencies) = combine_lines(&existing.data, incoming, mode);
    let changed = data != existing.data;
    let record = FileRecord {
        data,
        file_hash: existing.file_hash.clone(),
        first_updated_at: existing.first_updated_at,
        last_updated_at: if changed { now } else { existing.last_updated_at },
    };
    MergeOutcome {
        record,
        inconsistencies,
        changed,
        reset: false,
    }
}

/// Element-wise combination; the shorter array is padded with `NoCode`
///
/// Returns the combined lines and how many lines were `NoCode` on one side
/// and a count on the other. Padded positions are not counted.
#[must_use]
pub fn combine_lines(
    recorded: &LineCoverage,
    incoming: &LineCoverage,
    mode: MergeMode,
) -> (LineCoverage, usize) {
    let a = recorded.as_slice();
    let b = incoming.as_slice();
    let overlap = a.len().min(b.len());
    let mut inconsistencies = 0;

    let lines: Vec<LineHits> = (0..a.len().max(b.len()))
        .map(|idx| {
            let left = a.get(idx).copied().unwrap_or_default();
            let right = b.get(idx).copied().unwrap_or_default();
            match (left, right) {
                (LineHits::NoCode, LineHits::NoCode) => LineHits::NoCode,
                (LineHits::Count(x), LineHits::Count(y)) => LineHits::Count(mode.combine(x, y)),
                (LineHits::NoCode, LineHits::Count(n)) | (LineHits::Count(n), LineHits::NoCode) => {
                    if idx < overlap {
                        inconsistencies += 1;
                    }
                    LineHits::Count(n)
                }
            }
        })
        .collect();

    if inconsistencies > 0 {
        tracing::debug!(
            target: "linecov.merge",
            inconsistencies,
            "line classification disagreed between samples; kept counts"
        );
    }
    (LineCoverage::new(lines), inconsistencies)
}

/// Merge two whole aggregates
///
/// Files recorded against the same content combine line by line with
/// `mode`, keeping the earliest creation and latest update time. When the
/// content hashes differ, the more recently updated record wins.
#[must_use]
pub fn merge_files(
    left: &MergedCoverage,
    right: &MergedCoverage,
    mode: MergeMode,
) -> MergedCoverage {
    let mut merged = left.clone();
    for (path, incoming) in right {
        let combined = match merged.get(path) {
            None => incoming.clone(),
            Some(recorded) if recorded.file_hash != incoming.file_hash => {
                if incoming.last_updated_at >= recorded.last_updated_at {
                    incoming.clone()
                } else {
                    continue;
                }
            }
            Some(recorded) => FileRecord {
                data: combine_lines(&recorded.data, &incoming.data, mode).0,
                file_hash: recorded.file_hash.clone(),
                first_updated_at: recorded.first_updated_at.min(incoming.first_updated_at),
                last_updated_at: recorded.last_updated_at.max(incoming.last_updated_at),
            },
        };
        let _ = merged.insert(path.clone(), combined);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[Option<u64>]) -> LineCoverage {
        LineCoverage::from(values.to_vec())
    }

    #[test]
    fn test_absent_existing_creates_record() {
        let out = merge_file(None, &lines(&[None, Some(1)]), Some("h1"), MergeMode::AddDelta, 10);
        assert_eq!(out.record.data, lines(&[None, Some(1)]));
        assert_eq!(out.record.file_hash.as_deref(), Some("h1"));
        assert_eq!(out.record.first_updated_at, 10);
        assert_eq!(out.record.last_updated_at, 10);
        assert!(out.changed);
    }

    #[test]
    fn test_hash_change_resets_history() {
        let existing = FileRecord {
            data: lines(&[Some(1), Some(2), None]),
            file_hash: Some("H1".into()),
            first_updated_at: 5,
            last_updated_at: 6,
        };
        let incoming = lines(&[Some(0), Some(0)]);
        let out = merge_file(Some(&existing), &incoming, Some("H2"), MergeMode::AddDelta, 50);
        assert!(out.reset);
        assert_eq!(out.record.data, lines(&[Some(0), Some(0)]));
        assert_eq!(out.record.file_hash.as_deref(), Some("H2"));
        assert_eq!(out.record.first_updated_at, 50);
        assert_eq!(out.record.last_updated_at, 50);
    }

    #[test]
    fn test_add_delta_sums_counts() {
        let existing = FileRecord::new(lines(&[None, Some(1), Some(2)]), Some("h".into()), 1);
        let incoming = lines(&[None, Some(0), Some(3)]);
        let out = merge_file(Some(&existing), &incoming, Some("h"), MergeMode::AddDelta, 2);
        assert_eq!(out.record.data, lines(&[None, Some(1), Some(5)]));
        assert_eq!(out.record.first_updated_at, 1);
        assert_eq!(out.record.last_updated_at, 2);
    }

    #[test]
    fn test_max_cumulative_keeps_larger() {
        let existing = FileRecord::new(lines(&[Some(4), Some(1)]), None, 1);
        let incoming = lines(&[Some(2), Some(3)]);
        let out = merge_file(Some(&existing), &incoming, None, MergeMode::MaxCumulative, 2);
        assert_eq!(out.record.data, lines(&[Some(4), Some(3)]));
    }

    #[test]
    fn test_nocode_vs_count_resolves_to_count() {
        let existing = FileRecord::new(lines(&[None, Some(1)]), None, 1);
        let incoming = lines(&[Some(2), None]);
        let out = merge_file(Some(&existing), &incoming, None, MergeMode::AddDelta, 2);
        assert_eq!(out.record.data, lines(&[Some(2), Some(1)]));
        assert_eq!(out.inconsistencies, 2);
    }

    #[test]
    fn test_shorter_array_is_padded() {
        let (combined, inconsistencies) = combine_lines(
            &lines(&[Some(1)]),
            &lines(&[Some(1), None, Some(4)]),
            MergeMode::AddDelta,
        );
        assert_eq!(combined, lines(&[Some(2), None, Some(4)]));
        assert_eq!(inconsistencies, 0);
    }

    #[test]
    fn test_unchanged_merge_keeps_timestamp() {
        let existing = FileRecord::new(lines(&[None, Some(3)]), None, 1);
        let incoming = lines(&[None, Some(0)]);
        let out = merge_file(Some(&existing), &incoming, None, MergeMode::AddDelta, 99);
        assert!(!out.changed);
        assert_eq!(out.record.last_updated_at, 1);
    }

    #[test]
    fn test_merge_files_combines_phases() {
        let mut eager = MergedCoverage::new();
        let record = |data: &[Option<u64>], hash: &str, at| {
            FileRecord::new(lines(data), Some(hash.into()), at)
        };
        let _ = eager.insert("a.rb".into(), record(&[Some(1), None], "h", 1));
        let _ = eager.insert("b.rb".into(), record(&[Some(1)], "old", 1));
        let mut runtime = MergedCoverage::new();
        let _ = runtime.insert("a.rb".into(), record(&[Some(2), None], "h", 5));
        let _ = runtime.insert("b.rb".into(), record(&[Some(9)], "new", 7));

        let merged = merge_files(&eager, &runtime, MergeMode::AddDelta);
        assert_eq!(merged["a.rb"].data, lines(&[Some(3), None]));
        assert_eq!(merged["a.rb"].first_updated_at, 1);
        assert_eq!(merged["a.rb"].last_updated_at, 5);
        assert_eq!(merged["b.rb"].file_hash.as_deref(), Some("new"));
    }
}
