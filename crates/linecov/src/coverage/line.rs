//! Three-valued per-line coverage (Poka-Yoke)
//!
//! A line is either not executable at all, or executable with a hit count.
//! "Never reached" and "reached zero times" are different facts and the
//! types keep them apart: `NoCode` serializes as `null`, counts as numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coverage state of a single source line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum LineHits {
    /// Not executable (comment, blank line, syntax)
    #[default]
    NoCode,
    /// Executable, hit `n` times
    Count(u64),
}

impl LineHits {
    /// Hit count, or `None` for non-executable lines
    #[inline]
    #[must_use]
    pub const fn count(self) -> Option<u64> {
        match self {
            Self::NoCode => None,
            Self::Count(n) => Some(n),
        }
    }

    /// Whether the line is executable
    #[inline]
    #[must_use]
    pub const fn is_code(self) -> bool {
        matches!(self, Self::Count(_))
    }

    /// Whether the line was hit at least once
    #[inline]
    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::Count(n) if n > 0)
    }
}

impl From<Option<u64>> for LineHits {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::NoCode, Self::Count)
    }
}

impl From<LineHits> for Option<u64> {
    fn from(value: LineHits) -> Self {
        value.count()
    }
}

/// Ordered per-line coverage of one file; index 0 is line 1
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineCoverage(Vec<LineHits>);

impl LineCoverage {
    /// Create from per-line states
    #[must_use]
    pub fn new(lines: Vec<LineHits>) -> Self {
        Self(lines)
    }

    /// Create with `len` non-executable lines
    #[must_use]
    pub fn no_code(len: usize) -> Self {
        Self(vec![LineHits::NoCode; len])
    }

    /// Number of lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no lines at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// State of a 1-indexed line
    #[must_use]
    pub fn line(&self, line_number: usize) -> Option<LineHits> {
        line_number
            .checked_sub(1)
            .and_then(|idx| self.0.get(idx).copied())
    }

    /// Per-line states
    #[must_use]
    pub fn as_slice(&self) -> &[LineHits] {
        &self.0
    }

    /// Iterate over per-line states
    pub fn iter(&self) -> impl Iterator<Item = &LineHits> {
        self.0.iter()
    }

    /// Consume into per-line states
    #[must_use]
    pub fn into_inner(self) -> Vec<LineHits> {
        self.0
    }

    /// Whether any line carries a nonzero count
    #[must_use]
    pub fn has_hits(&self) -> bool {
        self.0.iter().any(|l| l.is_hit())
    }

    /// Number of executable lines
    #[must_use]
    pub fn relevant_lines(&self) -> usize {
        self.0.iter().filter(|l| l.is_code()).count()
    }

    /// Number of executable lines hit at least once
    #[must_use]
    pub fn covered_lines(&self) -> usize {
        self.0.iter().filter(|l| l.is_hit()).count()
    }
}

impl From<Vec<Option<u64>>> for LineCoverage {
    fn from(values: Vec<Option<u64>>) -> Self {
        Self(values.into_iter().map(LineHits::from).collect())
    }
}

impl From<Vec<LineHits>> for LineCoverage {
    fn from(lines: Vec<LineHits>) -> Self {
        Self(lines)
    }
}

impl FromIterator<LineHits> for LineCoverage {
    fn from_iter<I: IntoIterator<Item = LineHits>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Cumulative per-file hits since a tracking phase started
pub type Snapshot = HashMap<String, LineCoverage>;

/// Per-file hits accrued since the previous sample
pub type Delta = HashMap<String, LineCoverage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_count_serialize_distinctly() {
        let lines = LineCoverage::from(vec![None, Some(0), Some(3)]);
        let json = serde_json::to_string(&lines).unwrap();
        assert_eq!(json, "[null,0,3]");
    }

    #[test]
    fn test_line_is_one_indexed() {
        let lines = LineCoverage::from(vec![None, Some(7)]);
        assert_eq!(lines.line(0), None);
        assert_eq!(lines.line(1), Some(LineHits::NoCode));
        assert_eq!(lines.line(2), Some(LineHits::Count(7)));
        assert_eq!(lines.line(3), None);
    }

    #[test]
    fn test_zero_count_is_code_but_not_hit() {
        assert!(LineHits::Count(0).is_code());
        assert!(!LineHits::Count(0).is_hit());
        assert!(!LineHits::NoCode.is_code());
    }

    #[test]
    fn test_has_hits_ignores_zeros() {
        assert!(!LineCoverage::from(vec![None, Some(0), Some(0)]).has_hits());
        assert!(LineCoverage::from(vec![None, Some(0), Some(1)]).has_hits());
    }
}
