//! Tracker configuration
//!
//! Consumed by the collector and classifier, never mutated by them. Can be
//! built in code, loaded from YAML, and overridden from the environment.

use crate::result::LinecovResult;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Patterns always ignored; only `vendor` is dropped, by third-party tracking.
///
/// `/tmp` keeps build-time code compiled into temporary directories out of
/// runtime coverage. `schema.rb` is generated schema code.
pub const IGNORE_DEFAULTS: &[&str] = &["vendor", "/tmp", "internal:prelude", "schema.rb"];

/// Ignore pattern added when third-party tracking drops the `vendor` default
pub const VENDORED_STDLIB_IGNORE: &str = "vendor/stdlib-";

/// Group name for project files when third-party tracking is enabled
pub const APP_GROUP: &str = "App";

/// Group name for third-party files when third-party tracking is enabled
pub const LIBRARIES_GROUP: &str = "Libraries";

/// Named group rule: files whose path matches `pattern` belong to `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
    /// Group name
    pub name: String,
    /// Regular expression matched against the absolute path
    pub pattern: String,
}

/// Coverage tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Project root; tracked files live under it
    pub root: PathBuf,
    /// Additional roots reported alongside the project root
    pub root_paths: Vec<PathBuf>,
    /// Substring patterns; a matching path is never tracked
    pub ignore: Vec<String>,
    /// Track files under `third_party_paths`
    pub track_third_party: bool,
    /// Roots of installed third-party packages
    pub third_party_paths: Vec<PathBuf>,
    /// Ordered group rules; first match wins
    pub groups: Vec<GroupRule>,
    /// Log persistence failures
    pub verbose: bool,
    /// Surface persistence failures to the caller instead of swallowing them
    pub test_mode: bool,
    /// Flush on a background thread
    pub background_reporting_enabled: bool,
    /// Seconds between background flushes
    pub background_reporting_interval_secs: u64,
    /// Flush once more when the collector shuts down
    pub report_on_exit: bool,
    /// Budget for acquiring a store lock, in milliseconds
    pub store_lock_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            root_paths: Vec::new(),
            ignore: IGNORE_DEFAULTS.iter().map(|s| (*s).to_string()).collect(),
            track_third_party: false,
            third_party_paths: Vec::new(),
            groups: Vec::new(),
            verbose: false,
            test_mode: false,
            background_reporting_enabled: true,
            background_reporting_interval_secs: 30,
            report_on_exit: true,
            store_lock_timeout_ms: 5_000,
        }
    }
}

impl TrackerConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder
    #[must_use]
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Parse from YAML text
    pub fn from_yaml_str(yaml: &str) -> LinecovResult<Self> {
        let mut config: Self = serde_yaml_ng::from_str(yaml)?;
        config.normalize();
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: &Path) -> LinecovResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply `LINECOV_ROOT`, `LINECOV_VERBOSE` and `LINECOV_TEST_MODE`
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup("LINECOV_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(verbose) = lookup("LINECOV_VERBOSE") {
            self.verbose = parse_flag(&verbose);
        }
        if let Some(test_mode) = lookup("LINECOV_TEST_MODE") {
            self.test_mode = parse_flag(&test_mode);
        }
        self.normalize();
        self
    }

    /// Append ignore patterns; existing patterns, defaults included, stay
    pub fn add_ignores<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !self.ignore.contains(&pattern) {
                self.ignore.push(pattern);
            }
        }
    }

    /// Enable or disable third-party tracking
    ///
    /// Enabling drops the `vendor` default ignore (vendored packages are
    /// often where third-party code lives) while keeping vendored standard
    /// libraries ignored, and registers the `App` and `Libraries` groups.
    pub fn set_track_third_party(&mut self, enabled: bool) {
        self.track_third_party = enabled;
        if !enabled {
            return;
        }
        self.ignore.retain(|p| p != "vendor");
        self.add_ignores([VENDORED_STDLIB_IGNORE]);

        let root = regex::escape(&self.root.to_string_lossy());
        self.add_group(APP_GROUP, root);
        let libraries = self
            .third_party_paths
            .iter()
            .map(|p| regex::escape(&p.to_string_lossy()))
            .collect::<Vec<_>>()
            .join("|");
        if !libraries.is_empty() {
            self.add_group(LIBRARIES_GROUP, libraries);
        }
    }

    /// Define or replace a group
    pub fn add_group(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        let name = name.into();
        let pattern = pattern.into();
        if let Some(rule) = self.groups.iter_mut().find(|r| r.name == name) {
            rule.pattern = pattern;
        } else {
            self.groups.push(GroupRule { name, pattern });
        }
    }

    /// Third-party roots that exist on this system
    #[must_use]
    pub fn existing_third_party_paths(&self) -> Vec<PathBuf> {
        self.third_party_paths
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }

    /// Absolute project root, the prefix tracked paths start with
    #[must_use]
    pub fn current_root(&self) -> String {
        expand_path(&self.root).to_string_lossy().into_owned()
    }

    /// All roots that coverage may be reported under
    #[must_use]
    pub fn all_root_paths(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .root_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if self.track_third_party {
            roots.extend(
                self.third_party_paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned()),
            );
        }
        roots.push(format!("{}/", self.current_root().trim_end_matches('/')));
        roots
    }

    /// Serializable diagnostic view
    pub fn redacted(&self) -> LinecovResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Re-apply the invariants a deserialized or overridden config may break:
    /// absolute roots, defaults ahead of user ignores, third-party groups
    fn normalize(&mut self) {
        self.root = expand_path(&self.root);
        self.third_party_paths = self.third_party_paths.iter().map(|p| expand_path(p)).collect();

        let configured = std::mem::take(&mut self.ignore);
        self.ignore = IGNORE_DEFAULTS.iter().map(|s| (*s).to_string()).collect();
        self.add_ignores(configured);
        if self.track_third_party {
            self.set_track_third_party(true);
        }
    }
}

/// Absolute, lexically cleaned form of `path`, relative to the working directory
fn expand_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Builder for tracker configuration
#[derive(Debug, Default)]
pub struct TrackerConfigBuilder {
    root: Option<PathBuf>,
    root_paths: Vec<PathBuf>,
    ignore: Vec<String>,
    track_third_party: bool,
    third_party_paths: Vec<PathBuf>,
    groups: Vec<(String, String)>,
    verbose: bool,
    test_mode: bool,
    background_reporting: Option<bool>,
    interval_secs: Option<u64>,
    report_on_exit: Option<bool>,
    store_lock_timeout_ms: Option<u64>,
}

impl TrackerConfigBuilder {
    /// Set the project root
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Add an extra reporting root
    #[must_use]
    pub fn root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_paths.push(path.into());
        self
    }

    /// Add an ignore pattern on top of the defaults
    #[must_use]
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    /// Track third-party packages
    #[must_use]
    pub fn track_third_party(mut self, enabled: bool) -> Self {
        self.track_third_party = enabled;
        self
    }

    /// Add a third-party package root
    #[must_use]
    pub fn third_party_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.third_party_paths.push(path.into());
        self
    }

    /// Add a group rule
    #[must_use]
    pub fn group(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.groups.push((name.into(), pattern.into()));
        self
    }

    /// Enable verbose failure logging
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Surface persistence failures to callers
    #[must_use]
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Enable background reporting
    #[must_use]
    pub fn background_reporting(mut self, enabled: bool) -> Self {
        self.background_reporting = Some(enabled);
        self
    }

    /// Set seconds between background flushes
    #[must_use]
    pub fn background_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    /// Flush once more on shutdown
    #[must_use]
    pub fn report_on_exit(mut self, enabled: bool) -> Self {
        self.report_on_exit = Some(enabled);
        self
    }

    /// Set the store lock budget
    #[must_use]
    pub fn store_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.store_lock_timeout_ms = Some(ms);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        let mut config = TrackerConfig {
            root: self.root.unwrap_or(defaults.root),
            root_paths: self.root_paths,
            ignore: defaults.ignore,
            track_third_party: false,
            third_party_paths: self.third_party_paths,
            groups: Vec::new(),
            verbose: self.verbose,
            test_mode: self.test_mode,
            background_reporting_enabled: self
                .background_reporting
                .unwrap_or(defaults.background_reporting_enabled),
            background_reporting_interval_secs: match self.interval_secs {
                Some(0) | None => defaults.background_reporting_interval_secs,
                Some(secs) => secs,
            },
            report_on_exit: self.report_on_exit.unwrap_or(defaults.report_on_exit),
            store_lock_timeout_ms: self
                .store_lock_timeout_ms
                .unwrap_or(defaults.store_lock_timeout_ms),
        };
        config.add_ignores(self.ignore);
        for (name, pattern) in self.groups {
            config.add_group(name, pattern);
        }
        config.track_third_party = self.track_third_party;
        config.normalize();
        config
    }
}
