//! Worker lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting on the task channel.
    #[default]
    Idle,
    /// Running the handler for an item.
    Dispatching,
    /// Exited after receiving the termination signal.
    Terminated,
    /// Exited because nothing arrived within the idle timeout.
    Stalled,
}

impl WorkerState {
    /// Returns true if the worker has exited.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Stalled)
    }

    /// Returns true for an abnormal exit.
    #[must_use]
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::Stalled)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Terminated => write!(f, "terminated"),
            Self::Stalled => write!(f, "stalled"),
        }
    }
}

/// Final summary of one worker's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Worker number, from zero.
    pub worker_id: usize,
    /// The terminal state the worker reached.
    pub state: WorkerState,
    /// Number of handler attempts the worker made.
    pub processed: usize,
}

impl WorkerReport {
    /// Returns true if the worker stalled.
    #[must_use]
    pub fn stalled(&self) -> bool {
        self.state.is_abnormal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!WorkerState::Idle.is_terminal());
        assert!(!WorkerState::Dispatching.is_terminal());
        assert!(WorkerState::Terminated.is_terminal());
        assert!(WorkerState::Stalled.is_terminal());
    }

    #[test]
    fn test_only_stalled_is_abnormal() {
        assert!(WorkerState::Stalled.is_abnormal());
        assert!(!WorkerState::Terminated.is_abnormal());
    }

    #[test]
    fn test_display_and_serde_agree() {
        for state in [
            WorkerState::Idle,
            WorkerState::Dispatching,
            WorkerState::Terminated,
            WorkerState::Stalled,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, serde_json::json!(state.to_string()));
        }
    }
}
