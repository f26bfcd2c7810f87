//! File Classification
//!
//! Decides whether a file belongs to the tracked project and which report
//! group it falls in. Called for every file on every flush, so patterns are
//! compiled once from [`TrackerConfig`] and matching never allocates.

use crate::config::TrackerConfig;
use crate::result::LinecovResult;
use regex::{Regex, RegexSet};

/// Classification outcome for a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Part of the tracked project (or tracked third-party code)
    Tracked,
    /// Excluded from coverage
    Ignored,
}

/// Pre-compiled classification rules
#[derive(Debug, Clone)]
pub struct FileClassifier {
    /// Ignore patterns as escaped literals, matched in one pass
    ignore: RegexSet,
    /// Project root prefix
    project_root: String,
    /// Third-party roots, empty unless third-party tracking is enabled
    third_party_roots: Vec<String>,
    /// Ordered group rules
    groups: Vec<(String, Regex)>,
}

impl FileClassifier {
    /// Compile classification rules from configuration
    pub fn new(config: &TrackerConfig) -> LinecovResult<Self> {
        let ignore = RegexSet::new(config.ignore.iter().map(|p| regex::escape(p)))?;
        let third_party_roots = if config.track_third_party {
            config
                .existing_third_party_paths()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect()
        } else {
            Vec::new()
        };
        let groups = config
            .groups
            .iter()
            .map(|rule| Ok((rule.name.clone(), Regex::new(&rule.pattern)?)))
            .collect::<LinecovResult<Vec<_>>>()?;

        Ok(Self {
            ignore,
            project_root: config.current_root(),
            third_party_roots,
            groups,
        })
    }

    /// Classify a path; ignore patterns always win
    #[inline]
    #[must_use]
    pub fn classify(&self, path: &str) -> FileClass {
        if self.ignore.is_match(path) {
            return FileClass::Ignored;
        }
        if path.starts_with(&self.project_root)
            || self
                .third_party_roots
                .iter()
                .any(|root| path.starts_with(root.as_str()))
        {
            FileClass::Tracked
        } else {
            FileClass::Ignored
        }
    }

    /// Whether the path is tracked
    #[inline]
    #[must_use]
    pub fn is_tracked(&self, path: &str) -> bool {
        self.classify(path) == FileClass::Tracked
    }

    /// First group whose rule matches the path
    #[must_use]
    pub fn group(&self, path: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, pattern)| pattern.is_match(path))
            .map(|(name, _)| name.as_str())
    }

    /// Configured group names, in rule order
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Project root prefix
    #[must_use]
    pub fn project_root(&self) -> &str {
        &self.project_root
    }
}
