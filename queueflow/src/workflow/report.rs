//! Run metrics and the per-run report.

use crate::core::WorkerReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters updated by workers during a run.
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    succeeded: AtomicUsize,
    retried: AtomicUsize,
    failed: AtomicUsize,
    stalled: AtomicUsize,
}

impl WorkflowMetrics {
    /// Records a successful attempt.
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a re-enqueue.
    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an item that ended on the sentinel.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a stalled worker.
    pub fn record_stall(&self) {
        self.stalled.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful attempts so far.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Re-enqueues so far.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::Relaxed)
    }

    /// Sentinel outcomes so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Stalled workers so far.
    #[must_use]
    pub fn stalled(&self) -> usize {
        self.stalled.load(Ordering::Relaxed)
    }
}

/// Everything known about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport<O> {
    /// Run identifier.
    pub run_id: String,
    /// Outcomes in index order; empty in streaming mode.
    pub outcomes: Vec<O>,
    /// Items submitted.
    pub submitted: usize,
    /// Distinct indices that produced a result.
    pub completed: usize,
    /// Items that succeeded.
    pub succeeded: usize,
    /// Re-enqueues performed.
    pub retried: usize,
    /// Items that ended on the sentinel.
    pub failed: usize,
    /// Whether the drain barrier resolved before shutdown.
    pub drained: bool,
    /// Per-worker summaries, ordered by worker id.
    pub workers: Vec<WorkerReport>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Wall time of the run.
    pub duration_ms: f64,
}

impl<O> WorkflowReport<O> {
    /// Number of workers that exited on the idle timeout.
    #[must_use]
    pub fn stalled_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.stalled()).count()
    }

    /// True if the drain barrier resolved, so every submitted item reached
    /// a terminal outcome.
    ///
    /// `completed` can trail `submitted` on a complete run when a producer
    /// reuses an index.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.drained
    }

    /// Converts to a dictionary, without the outcomes.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "submitted": self.submitted,
            "completed": self.completed,
            "succeeded": self.succeeded,
            "retried": self.retried,
            "failed": self.failed,
            "drained": self.drained,
            "stalled_workers": self.stalled_workers(),
            "complete": self.is_complete(),
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": self.finished_at.to_rfc3339(),
            "duration_ms": self.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkerState;

    fn report(submitted: usize, completed: usize, drained: bool) -> WorkflowReport<i32> {
        let now = Utc::now();
        WorkflowReport {
            run_id: "run".to_string(),
            outcomes: Vec::new(),
            submitted,
            completed,
            succeeded: completed,
            retried: 0,
            failed: 0,
            drained,
            workers: vec![
                WorkerReport {
                    worker_id: 0,
                    state: WorkerState::Terminated,
                    processed: 2,
                },
                WorkerReport {
                    worker_id: 1,
                    state: WorkerState::Stalled,
                    processed: 0,
                },
            ],
            started_at: now,
            finished_at: now,
            duration_ms: 0.0,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = WorkflowMetrics::default();
        metrics.record_success();
        metrics.record_success();
        metrics.record_retry();
        metrics.record_failure();
        metrics.record_stall();

        assert_eq!(metrics.succeeded(), 2);
        assert_eq!(metrics.retried(), 1);
        assert_eq!(metrics.failed(), 1);
        assert_eq!(metrics.stalled(), 1);
    }

    #[test]
    fn test_completeness() {
        assert!(report(2, 2, true).is_complete());
        assert!(report(2, 1, true).is_complete());
        assert!(!report(2, 2, false).is_complete());
    }

    #[test]
    fn test_to_dict() {
        let dict = report(3, 2, false).to_dict();
        assert_eq!(dict["stalled_workers"], 1);
        assert_eq!(dict["complete"], false);
        assert_eq!(dict["submitted"], 3);
    }
}
