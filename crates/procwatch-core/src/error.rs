//! Error types for the process watcher.
//!
//! Configuration and bind failures surface synchronously to whoever triggered
//! them. Per-sample and per-listener faults are logged by the watch loop and
//! never stop it.

use thiserror::Error;

/// Main error type for procwatch.
#[derive(Debug, Error)]
pub enum WatchError {
    // Identity errors
    #[error("Unknown identity key: {key}")]
    UnknownIdentity { key: String },

    #[error("Duplicate identity key in configuration: {key}")]
    DuplicateKey { key: String },

    // Probe errors
    #[error("Failed to bind liveness probe: {message}")]
    ProbeBindFailure { message: String },

    #[error("Liveness query for {key} failed: {message}")]
    ProbeQuery { key: String, message: String },

    #[error("Probe does not support push notifications")]
    PushUnsupported,

    // Listener errors
    #[error("Listener {listener} faulted: {message}")]
    ListenerFault { listener: String, message: String },

    // Lifecycle errors
    #[error("Monitor has been terminated")]
    Terminated,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for procwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

impl WatchError {
    /// Create a bind failure from any displayable cause.
    pub fn bind_failure(cause: impl std::fmt::Display) -> Self {
        WatchError::ProbeBindFailure {
            message: cause.to_string(),
        }
    }

    /// Check if this error prevents the monitor from running at all.
    ///
    /// Everything else is isolated to one sample or one listener.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::DuplicateKey { .. }
                | WatchError::ProbeBindFailure { .. }
                | WatchError::PushUnsupported
                | WatchError::Config { .. }
                | WatchError::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchError::UnknownIdentity {
            key: "com.example.Nope".into(),
        };
        assert_eq!(err.to_string(), "Unknown identity key: com.example.Nope");

        let err = WatchError::bind_failure("no process table");
        assert_eq!(
            err.to_string(),
            "Failed to bind liveness probe: no process table"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(WatchError::DuplicateKey { key: "a".into() }.is_fatal());
        assert!(WatchError::bind_failure("x").is_fatal());
        assert!(WatchError::PushUnsupported.is_fatal());
        assert!(WatchError::Terminated.is_fatal());
        assert!(!WatchError::UnknownIdentity { key: "a".into() }.is_fatal());
        assert!(!WatchError::ListenerFault {
            listener: "l".into(),
            message: "boom".into()
        }
        .is_fatal());
        assert!(!WatchError::ProbeQuery {
            key: "a".into(),
            message: "io".into()
        }
        .is_fatal());
    }
}
