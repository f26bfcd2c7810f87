//! Soft Jidoka: Log-and-Continue vs Propagate
//!
//! Coverage runs inside arbitrary host code paths. In production a failed
//! flush must never reach the host; under test it should stop the line so
//! bugs surface. The choice is made once, when the collector is built.

use crate::config::TrackerConfig;
use crate::result::{LinecovError, LinecovResult};
use std::fmt::Debug;
use std::sync::Arc;

/// What to do with a failed flush
pub trait ErrorPolicy: Send + Sync + Debug {
    /// Handle `error`; returning `Ok` swallows it
    fn on_failure(&self, error: LinecovError) -> LinecovResult<()>;
}

/// Production policy: optionally log, never fail the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndContinue {
    /// Log failures at error level
    pub verbose: bool,
}

impl ErrorPolicy for LogAndContinue {
    fn on_failure(&self, error: LinecovError) -> LinecovResult<()> {
        if self.verbose {
            tracing::error!(
                target: "linecov.collector",
                error = %error,
                "coverage failed to store"
            );
        }
        Ok(())
    }
}

/// Test policy: log, then hand the error back to the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

impl ErrorPolicy for Propagate {
    fn on_failure(&self, error: LinecovError) -> LinecovResult<()> {
        tracing::error!(target: "linecov.collector", error = %error, "coverage failed to store");
        Err(error)
    }
}

/// Policy implied by the configuration's `test_mode` and `verbose` flags
#[must_use]
pub fn policy_for(config: &TrackerConfig) -> Arc<dyn ErrorPolicy> {
    if config.test_mode {
        Arc::new(Propagate)
    } else {
        Arc::new(LogAndContinue {
            verbose: config.verbose,
        })
    }
}
