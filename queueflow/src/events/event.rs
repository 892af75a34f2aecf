//! Typed workflow events.

use serde_json::{json, Value};

/// A telemetry event raised during a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A run began.
    WorkflowStarted {
        /// Run identifier.
        run_id: String,
        /// Workers started for the run.
        workers: usize,
        /// Task channel capacity.
        capacity: usize,
        /// Item count, when the source is a fixed list.
        known_items: Option<usize>,
    },
    /// A run finished.
    WorkflowCompleted {
        /// Run identifier.
        run_id: String,
        /// Items submitted.
        submitted: usize,
        /// Distinct indices with a result.
        completed: usize,
        /// Re-enqueues performed.
        retried: usize,
        /// Items that ended on the sentinel.
        failed: usize,
        /// Workers that exited on the idle timeout.
        stalled_workers: usize,
        /// Wall time of the run.
        duration_ms: f64,
    },
    /// A worker entered its receive loop.
    WorkerStarted {
        /// Run identifier.
        run_id: String,
        /// Worker number.
        worker_id: usize,
    },
    /// A worker received its termination signal.
    WorkerTerminated {
        /// Run identifier.
        run_id: String,
        /// Worker number.
        worker_id: usize,
        /// Attempts the worker made.
        processed: usize,
    },
    /// A worker gave up waiting for work.
    WorkerStalled {
        /// Run identifier.
        run_id: String,
        /// Worker number.
        worker_id: usize,
        /// Attempts the worker made.
        processed: usize,
        /// Unacknowledged items at the time of the stall.
        unfinished: usize,
    },
    /// An item attempt succeeded.
    ItemSucceeded {
        /// Run identifier.
        run_id: String,
        /// Item index.
        index: usize,
        /// Attempt that succeeded.
        attempt: u32,
    },
    /// An item attempt failed and was re-enqueued.
    ItemRetry {
        /// Run identifier.
        run_id: String,
        /// Item index.
        index: usize,
        /// Attempt that failed.
        attempt: u32,
        /// Failure kind.
        kind: &'static str,
        /// Failure message.
        error: String,
        /// Delay before the item is visible again.
        delay_ms: u64,
    },
    /// An item exhausted its retries.
    ItemFailed {
        /// Run identifier.
        run_id: String,
        /// Item index.
        index: usize,
        /// Handler invocations made for the item.
        attempts: u32,
        /// Failure kind of the last attempt.
        kind: &'static str,
        /// Failure message of the last attempt.
        error: String,
    },
}

impl WorkflowEvent {
    /// Dotted event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow.started",
            Self::WorkflowCompleted { .. } => "workflow.completed",
            Self::WorkerStarted { .. } => "worker.started",
            Self::WorkerTerminated { .. } => "worker.terminated",
            Self::WorkerStalled { .. } => "worker.stalled",
            Self::ItemSucceeded { .. } => "item.succeeded",
            Self::ItemRetry { .. } => "item.retry",
            Self::ItemFailed { .. } => "item.failed",
        }
    }

    /// Event payload as a JSON object.
    #[must_use]
    pub fn data(&self) -> Value {
        match self {
            Self::WorkflowStarted {
                run_id,
                workers,
                capacity,
                known_items,
            } => json!({
                "run_id": run_id,
                "workers": workers,
                "capacity": capacity,
                "known_items": known_items,
            }),
            Self::WorkflowCompleted {
                run_id,
                submitted,
                completed,
                retried,
                failed,
                stalled_workers,
                duration_ms,
            } => json!({
                "run_id": run_id,
                "submitted": submitted,
                "completed": completed,
                "retried": retried,
                "failed": failed,
                "stalled_workers": stalled_workers,
                "duration_ms": duration_ms,
            }),
            Self::WorkerStarted { run_id, worker_id } => json!({
                "run_id": run_id,
                "worker_id": worker_id,
            }),
            Self::WorkerTerminated {
                run_id,
                worker_id,
                processed,
            } => json!({
                "run_id": run_id,
                "worker_id": worker_id,
                "processed": processed,
            }),
            Self::WorkerStalled {
                run_id,
                worker_id,
                processed,
                unfinished,
            } => json!({
                "run_id": run_id,
                "worker_id": worker_id,
                "processed": processed,
                "unfinished": unfinished,
            }),
            Self::ItemSucceeded {
                run_id,
                index,
                attempt,
            } => json!({
                "run_id": run_id,
                "index": index,
                "attempt": attempt,
            }),
            Self::ItemRetry {
                run_id,
                index,
                attempt,
                kind,
                error,
                delay_ms,
            } => json!({
                "run_id": run_id,
                "index": index,
                "attempt": attempt,
                "kind": kind,
                "error": error,
                "delay_ms": delay_ms,
            }),
            Self::ItemFailed {
                run_id,
                index,
                attempts,
                kind,
                error,
            } => json!({
                "run_id": run_id,
                "index": index,
                "attempts": attempts,
                "kind": kind,
                "error": error,
            }),
        }
    }
}
