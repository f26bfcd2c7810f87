//! Coverage Report Data
//!
//! Summaries of the merged aggregate for report consumers: per file, per
//! group and overall. Rendering is left to the consumer.

use super::{FileClassifier, MergedCoverage};
use serde::Serialize;
use std::collections::BTreeMap;

/// Line totals shared by file, group and overall summaries
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CoverageSummary {
    /// Executable lines
    pub relevant_lines: usize,
    /// Executable lines hit at least once
    pub covered_lines: usize,
    /// Covered share of relevant lines, 0-100
    pub coverage_percent: f64,
}

impl CoverageSummary {
    fn from_counts(relevant_lines: usize, covered_lines: usize) -> Self {
        let coverage_percent = if relevant_lines == 0 {
            100.0
        } else {
            covered_lines as f64 / relevant_lines as f64 * 100.0
        };
        Self {
            relevant_lines,
            covered_lines,
            coverage_percent,
        }
    }

    fn add(&mut self, other: &Self) {
        *self = Self::from_counts(
            self.relevant_lines + other.relevant_lines,
            self.covered_lines + other.covered_lines,
        );
    }
}

/// Per-file report entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    /// Source path
    pub path: String,
    /// Group the file belongs to, if any
    pub group: Option<String>,
    /// Line totals
    pub summary: CoverageSummary,
    /// Hit count of the most executed line
    pub max_hits: u64,
    /// When the record was created (Unix seconds)
    pub first_updated_at: i64,
    /// When the data last changed (Unix seconds)
    pub last_updated_at: i64,
}

/// Report over a merged aggregate
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CoverageReport {
    files: Vec<FileSummary>,
    groups: BTreeMap<String, CoverageSummary>,
    totals: CoverageSummary,
}

impl CoverageReport {
    /// Summarize `merged`, grouping files with `classifier`
    #[must_use]
    pub fn build(merged: &MergedCoverage, classifier: &FileClassifier) -> Self {
        let mut report = Self {
            totals: CoverageSummary::from_counts(0, 0),
            ..Self::default()
        };
        for name in classifier.group_names() {
            let _ = report
                .groups
                .insert(name.to_string(), CoverageSummary::from_counts(0, 0));
        }

        for (path, record) in merged {
            let summary = CoverageSummary::from_counts(
                record.data.relevant_lines(),
                record.data.covered_lines(),
            );
            let group = classifier.group(path).map(String::from);
            if let Some(name) = &group {
                report
                    .groups
                    .entry(name.clone())
                    .or_insert_with(|| CoverageSummary::from_counts(0, 0))
                    .add(&summary);
            }
            report.totals.add(&summary);
            report.files.push(FileSummary {
                path: path.clone(),
                group,
                summary,
                max_hits: record.data.iter().filter_map(|l| l.count()).max().unwrap_or(0),
                first_updated_at: record.first_updated_at,
                last_updated_at: record.last_updated_at,
            });
        }
        report
    }

    /// Per-file entries, sorted by path
    #[must_use]
    pub fn files(&self) -> &[FileSummary] {
        &self.files
    }

    /// Entry for one file
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileSummary> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Totals for one group
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&CoverageSummary> {
        self.groups.get(name)
    }

    /// Totals per group
    #[must_use]
    pub fn groups(&self) -> &BTreeMap<String, CoverageSummary> {
        &self.groups
    }

    /// Totals across all files
    #[must_use]
    pub fn totals(&self) -> CoverageSummary {
        self.totals
    }

    /// Files with no covered line
    pub fn uncovered_files(&self) -> impl Iterator<Item = &FileSummary> {
        self.files.iter().filter(|f| f.summary.covered_lines == 0)
    }
}
