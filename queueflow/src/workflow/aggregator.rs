//! Result collection for a run.
//!
//! Records arrive in completion order. Without a callback they are
//! buffered by index and reassembled into input order once every worker
//! has exited; with a callback each record is handed over as it arrives.

use crate::core::ResultRecord;
use crate::errors::WorkflowError;
use crate::handler::{Extras, ResultCallback};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// What the aggregator saw.
#[derive(Debug)]
pub(crate) struct Aggregation<O> {
    /// Outcomes in index order; empty in streaming mode.
    pub(crate) outcomes: Vec<O>,
    /// Distinct indices that produced a record.
    pub(crate) completed: usize,
    /// First callback failure, if any.
    pub(crate) error: Option<WorkflowError>,
}

/// Consumes result records until every sender is gone.
pub(crate) async fn aggregate<P, O>(
    mut results: mpsc::UnboundedReceiver<ResultRecord<P, O>>,
    callback: Option<Arc<dyn ResultCallback<P, O>>>,
    extras: Extras,
) -> Aggregation<O> {
    match callback {
        Some(callback) => {
            let mut seen = HashSet::new();
            let mut error = None;
            while let Some(record) = results.recv().await {
                let index = record.index;
                if !seen.insert(index) {
                    warn!(index, "Duplicate result index");
                }
                if error.is_some() {
                    continue;
                }
                if let Err(source) = callback.on_result(record, Arc::clone(&extras)).await {
                    warn!(index, error = %source, "Result callback failed, later results are discarded");
                    error = Some(WorkflowError::Callback { index, source });
                }
            }
            Aggregation {
                outcomes: Vec::new(),
                completed: seen.len(),
                error,
            }
        }
        None => {
            let mut ordered = BTreeMap::new();
            while let Some(record) = results.recv().await {
                let index = record.index;
                if ordered.insert(index, record.outcome).is_some() {
                    warn!(index, "Duplicate result index, keeping the latest outcome");
                }
            }
            Aggregation {
                completed: ordered.len(),
                outcomes: ordered.into_values().collect(),
                error: None,
            }
        }
    }
}
