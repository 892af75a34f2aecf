//! Test assertions for workflow runs.

use crate::workflow::WorkflowReport;
use std::fmt::Debug;

/// Asserts that every submitted item produced a result.
pub fn assert_complete<O>(report: &WorkflowReport<O>) {
    assert!(
        report.is_complete(),
        "Expected a complete run, got {} of {} items (drained: {}, stalled workers: {})",
        report.completed,
        report.submitted,
        report.drained,
        report.stalled_workers()
    );
}

/// Asserts that the run's outcomes match `expected` in order.
pub fn assert_outcomes<O: PartialEq + Debug>(report: &WorkflowReport<O>, expected: &[O]) {
    assert_eq!(
        report.outcomes.as_slice(),
        expected,
        "Outcomes differ for run {}",
        report.run_id
    );
}

/// Asserts that no worker stalled.
pub fn assert_no_stalls<O>(report: &WorkflowReport<O>) {
    assert_eq!(
        report.stalled_workers(),
        0,
        "Expected no stalled workers, worker states: {:?}",
        report.workers.iter().map(|w| w.state).collect::<Vec<_>>()
    );
}

/// Asserts the run's retry and failure counters.
pub fn assert_counts<O>(report: &WorkflowReport<O>, retried: usize, failed: usize) {
    assert_eq!(
        (report.retried, report.failed),
        (retried, failed),
        "Expected (retried, failed) = ({retried}, {failed})"
    );
}
