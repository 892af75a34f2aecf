//! Error types for the queueflow engine.
//!
//! Per-item handler failures never surface as pipeline-level errors; they
//! become sentinel outcomes. Only configuration problems, caller-supplied
//! producer/callback failures and internal faults reach the caller.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used at the seams where user code plugs in.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for workflow runs.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The configuration was rejected before any worker started.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The dynamic producer returned an error.
    #[error("Producer failed: {0}")]
    Producer(BoxError),

    /// The completion callback returned an error.
    #[error("Callback failed for item {index}: {source}")]
    Callback {
        /// Index of the record being delivered.
        index: usize,
        /// The callback's error.
        #[source]
        source: BoxError,
    },

    /// The task queue was closed while enqueueing.
    #[error("Task queue is closed")]
    QueueClosed,

    /// Workers stalled and the result set is missing items.
    #[error(
        "Workflow incomplete: {completed} of {submitted} items completed \
         ({stalled_workers} stalled workers)"
    )]
    Incomplete {
        /// Number of items submitted.
        submitted: usize,
        /// Number of distinct items with a result.
        completed: usize,
        /// Number of workers that exited on the idle timeout.
        stalled_workers: usize,
    },

    /// An unexpected internal fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Returns true if this error was raised by configuration validation.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Error raised when a workflow configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration for '{field}': {message}")]
pub struct ConfigError {
    /// The offending configuration field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an error for a value below its minimum.
    #[must_use]
    pub fn below_minimum(field: impl Into<String>, value: u64, minimum: u64) -> Self {
        Self::new(field, format!("{value} is below the minimum of {minimum}"))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("ConfigError"));
        map.insert("field".to_string(), serde_json::json!(self.field));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}

/// Why a single handler attempt failed.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("{0}")]
    Error(BoxError),

    /// The handler exceeded the per-item deadline.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The handler panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl HandlerFailure {
    /// Short label used in logs and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::TimedOut(_) => "timeout",
            Self::Panicked(_) => "panic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::below_minimum("worker_count", 1, 2);
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'worker_count': 1 is below the minimum of 2"
        );
    }

    #[test]
    fn test_config_error_to_dict() {
        let dict = ConfigError::new("max_retry", "too small").to_dict();
        assert_eq!(dict.get("type").unwrap(), "ConfigError");
        assert_eq!(dict.get("field").unwrap(), "max_retry");
    }

    #[test]
    fn test_workflow_error_from_config() {
        let err: WorkflowError = ConfigError::new("idle_timeout_ms", "must be positive").into();
        assert!(err.is_config());
    }

    #[test]
    fn test_incomplete_display() {
        let err = WorkflowError::Incomplete {
            submitted: 5,
            completed: 3,
            stalled_workers: 2,
        };
        assert!(err.to_string().contains("3 of 5"));
    }

    #[test]
    fn test_handler_failure_kind() {
        assert_eq!(HandlerFailure::TimedOut(Duration::from_millis(5)).kind(), "timeout");
        assert_eq!(HandlerFailure::Panicked("boom".into()).kind(), "panic");
        assert_eq!(HandlerFailure::Error("bad".into()).kind(), "error");
        assert_eq!(
            HandlerFailure::TimedOut(Duration::from_millis(250)).to_string(),
            "timed out after 250ms"
        );
    }
}
