//! Result and error types for Linecov.

use thiserror::Error;

/// Result type for Linecov operations
pub type LinecovResult<T> = Result<T, LinecovError>;

/// Errors that can occur in Linecov
#[derive(Debug, Error)]
pub enum LinecovError {
    /// Configuration is missing or invalid (fatal on first use)
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The store boundary failed to load or persist coverage
    #[error("Coverage failed to store: {message}")]
    Persistence {
        /// Error message
        message: String,
    },

    /// A store lock or network round-trip exceeded its budget
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// The store does not implement the requested operation
    #[error("{store} does not implement the {operation} method")]
    Unsupported {
        /// Store name
        store: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// The collector was asked to move to a phase it cannot reach
    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition {
        /// Current phase
        from: &'static str,
        /// Requested phase
        to: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid group or ignore pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl LinecovError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a persistence error
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Whether this error originated at the store boundary
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. }
                | Self::Timeout { .. }
                | Self::Unsupported { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}
