//! Tracking phases
//!
//! Coverage seen while the application boots (eager loading) is kept apart
//! from coverage seen while it serves traffic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase a flushed batch was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    /// No phase declared yet; stored with runtime coverage
    #[default]
    Unset,
    /// Boot-time eager loading
    Eager,
    /// Serving real traffic
    Runtime,
}

impl TrackingPhase {
    /// Stable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Eager => "eager",
            Self::Runtime => "runtime",
        }
    }

    /// Whether batches from this phase land in the eager bucket
    #[must_use]
    pub const fn is_eager(self) -> bool {
        matches!(self, Self::Eager)
    }
}

impl fmt::Display for TrackingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collector lifecycle: `Uninitialized -> Eager -> Runtime`, never back to `Eager`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorState {
    /// Built, no phase declared
    #[default]
    Uninitialized,
    /// Application code is loading
    Eager,
    /// Application is serving traffic
    Runtime,
}

impl CollectorState {
    /// Phase tag for batches flushed in this state
    #[must_use]
    pub const fn phase(self) -> TrackingPhase {
        match self {
            Self::Uninitialized => TrackingPhase::Unset,
            Self::Eager => TrackingPhase::Eager,
            Self::Runtime => TrackingPhase::Runtime,
        }
    }

    /// Stable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Eager => "eager",
            Self::Runtime => "runtime",
        }
    }

    /// Whether `next` is reachable from this state
    #[must_use]
    pub const fn can_enter(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized | Self::Eager, Self::Eager)
                | (_, Self::Runtime)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use CollectorState::*;
        assert!(Uninitialized.can_enter(Eager));
        assert!(Uninitialized.can_enter(Runtime));
        assert!(Eager.can_enter(Runtime));
        assert!(Eager.can_enter(Eager));
        assert!(Runtime.can_enter(Runtime));
        assert!(!Runtime.can_enter(Eager));
        assert!(!Eager.can_enter(Uninitialized));
    }

    #[test]
    fn test_phase_tags() {
        assert_eq!(CollectorState::Uninitialized.phase(), TrackingPhase::Unset);
        assert_eq!(CollectorState::Runtime.phase(), TrackingPhase::Runtime);
        assert!(TrackingPhase::Eager.is_eager());
        assert!(!TrackingPhase::Unset.is_eager());
    }
}
