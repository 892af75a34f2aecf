//! Workflow execution.
//!
//! A [`Workflow`] owns a handler, an optional streaming callback and a
//! validated configuration. Each run wires a fresh task queue, worker pool,
//! coordinator and aggregator together and tears them down before it
//! returns, so a workflow can be run any number of times.

use super::aggregator::aggregate;
use super::builder::WorkflowBuilder;
use super::config::{StallPolicy, WorkflowConfig};
use super::coordinator::coordinate;
use super::report::{WorkflowMetrics, WorkflowReport};
use super::worker::{run_worker, WorkerContext};
use crate::core::{ResultRecord, WorkerReport};
use crate::errors::WorkflowError;
use crate::events::{publish, EventSink, WorkflowEvent};
use crate::handler::{invoke, Extras, Handler, ResultCallback};
use crate::observability::SpanTimer;
use crate::queue::TaskQueue;
use crate::source::{ItemSource, Producer};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A validated, reusable work-distribution workflow.
pub struct Workflow<P, O> {
    handler: Arc<dyn Handler<P, O>>,
    callback: Option<Arc<dyn ResultCallback<P, O>>>,
    extras: Extras,
    error_value: O,
    config: WorkflowConfig,
    events: Arc<dyn EventSink>,
}

/// Raw numbers gathered while a run executes.
struct RunParts<O> {
    outcomes: Vec<O>,
    submitted: usize,
    completed: usize,
    drained: bool,
    workers: Vec<WorkerReport>,
    metrics: Arc<WorkflowMetrics>,
}

impl<P, O> Workflow<P, O> {
    pub(crate) fn new(
        handler: Arc<dyn Handler<P, O>>,
        callback: Option<Arc<dyn ResultCallback<P, O>>>,
        extras: Extras,
        error_value: O,
        config: WorkflowConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            handler,
            callback,
            extras,
            error_value,
            config,
            events,
        }
    }

    /// Returns the workflow's configuration.
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Returns true if results are delivered through a callback.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.callback.is_some()
    }
}

impl<P, O: Default> Workflow<P, O> {
    /// Starts building a workflow around `handler`.
    #[must_use]
    pub fn builder<H>(handler: H) -> WorkflowBuilder<P, O>
    where
        H: Handler<P, O> + 'static,
    {
        WorkflowBuilder::new(handler)
    }
}

impl<P, O> Workflow<P, O>
where
    P: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Processes a fixed list of payloads.
    ///
    /// Returns one outcome per payload in input order, or an empty vector
    /// in streaming mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback fails, or if workers stall under
    /// [`StallPolicy::Abort`]. Handler failures never surface here.
    pub async fn run(&self, items: Vec<P>) -> Result<Vec<O>, WorkflowError> {
        self.run_source(ItemSource::Static(items)).await
    }

    /// Processes whatever `producer` enqueues.
    ///
    /// # Errors
    ///
    /// As [`Workflow::run`], plus the producer's own failure.
    pub async fn run_with_producer(
        &self,
        producer: impl Producer<P> + 'static,
    ) -> Result<Vec<O>, WorkflowError> {
        self.run_source(ItemSource::producer(producer)).await
    }

    /// Processes any item source and returns the outcomes.
    ///
    /// # Errors
    ///
    /// As [`Workflow::run_with_report`].
    pub async fn run_source(&self, source: ItemSource<P>) -> Result<Vec<O>, WorkflowError> {
        Ok(self.run_with_report(source).await?.outcomes)
    }

    /// Processes any item source and returns the full run report.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer or callback fails, if a worker task
    /// dies unexpectedly, or if the run is incomplete under
    /// [`StallPolicy::Abort`].
    pub async fn run_with_report(
        &self,
        source: ItemSource<P>,
    ) -> Result<WorkflowReport<O>, WorkflowError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let timer = SpanTimer::start("workflow.run");

        let parts = match source {
            ItemSource::Static(mut items) if items.len() <= 1 => {
                self.run_inline(&run_id, items.pop()).await?
            }
            source => self.run_pool(&run_id, source).await?,
        };

        self.finish(run_id, started_at, timer, parts).await
    }

    /// Handles the empty and single-item cases without a worker pool.
    async fn run_inline(&self, run_id: &str, payload: Option<P>) -> Result<RunParts<O>, WorkflowError> {
        let metrics = Arc::new(WorkflowMetrics::default());
        let Some(payload) = payload else {
            debug!(run_id, "No items to process");
            return Ok(RunParts {
                outcomes: Vec::new(),
                submitted: 0,
                completed: 0,
                drained: true,
                workers: Vec::new(),
                metrics,
            });
        };

        debug!(run_id, "Single item, bypassing the worker pool");
        let outcome = match invoke(&*self.handler, payload.clone(), self.config.item_timeout()).await {
            Ok(outcome) => {
                metrics.record_success();
                publish(
                    &*self.events,
                    WorkflowEvent::ItemSucceeded {
                        run_id: run_id.to_string(),
                        index: 0,
                        attempt: 0,
                    },
                )
                .await;
                outcome
            }
            Err(failure) => {
                warn!(run_id, index = 0, kind = failure.kind(), error = %failure, "Single item failed");
                metrics.record_failure();
                publish(
                    &*self.events,
                    WorkflowEvent::ItemFailed {
                        run_id: run_id.to_string(),
                        index: 0,
                        attempts: 1,
                        kind: failure.kind(),
                        error: failure.to_string(),
                    },
                )
                .await;
                self.error_value.clone()
            }
        };

        let record = ResultRecord::new(0, outcome, payload);
        let outcomes = match &self.callback {
            Some(callback) => {
                callback
                    .on_result(record, Arc::clone(&self.extras))
                    .await
                    .map_err(|source| WorkflowError::Callback { index: 0, source })?;
                Vec::new()
            }
            None => vec![record.outcome],
        };

        Ok(RunParts {
            outcomes,
            submitted: 1,
            completed: 1,
            drained: true,
            workers: Vec::new(),
            metrics,
        })
    }

    /// Runs a source through the full worker pool.
    async fn run_pool(&self, run_id: &str, source: ItemSource<P>) -> Result<RunParts<O>, WorkflowError> {
        let known_items = source.known_len();
        let worker_count = known_items.map_or(self.config.worker_count, |n| self.config.worker_count.min(n));
        let capacity = self.config.capacity_for(worker_count);
        let queue = TaskQueue::new(capacity);
        let metrics = Arc::new(WorkflowMetrics::default());
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        info!(
            run_id,
            workers = worker_count,
            capacity,
            known_items,
            max_retry = self.config.max_retry,
            streaming = self.is_streaming(),
            "Starting workflow"
        );
        publish(
            &*self.events,
            WorkflowEvent::WorkflowStarted {
                run_id: run_id.to_string(),
                workers: worker_count,
                capacity,
                known_items,
            },
        )
        .await;

        let ctx = Arc::new(WorkerContext {
            run_id: run_id.to_string(),
            queue: Arc::clone(&queue),
            results: results_tx,
            handler: Arc::clone(&self.handler),
            error_value: self.error_value.clone(),
            max_retry: self.config.max_retry,
            item_timeout: self.config.item_timeout(),
            idle_timeout: self.config.idle_timeout(),
            backoff: self.config.retry_backoff.clone(),
            events: Arc::clone(&self.events),
            metrics: Arc::clone(&metrics),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(run_worker(worker_id, Arc::clone(&ctx)));
        }
        // The result channel closes once the last worker drops its context.
        drop(ctx);

        let (shutdown, aggregation) = tokio::join!(
            coordinate(Arc::clone(&queue), source, workers, worker_count),
            aggregate(results_rx, self.callback.clone(), Arc::clone(&self.extras)),
        );
        let shutdown = shutdown?;
        shutdown.produced?;
        if let Some(err) = aggregation.error {
            return Err(err);
        }

        Ok(RunParts {
            outcomes: aggregation.outcomes,
            submitted: queue.submitted(),
            completed: aggregation.completed,
            drained: shutdown.drained,
            workers: shutdown.workers,
            metrics,
        })
    }

    /// Builds the report, emits completion telemetry and applies the stall policy.
    async fn finish(
        &self,
        run_id: String,
        started_at: DateTime<Utc>,
        timer: SpanTimer,
        parts: RunParts<O>,
    ) -> Result<WorkflowReport<O>, WorkflowError> {
        let report = WorkflowReport {
            run_id,
            outcomes: parts.outcomes,
            submitted: parts.submitted,
            completed: parts.completed,
            succeeded: parts.metrics.succeeded(),
            retried: parts.metrics.retried(),
            failed: parts.metrics.failed(),
            drained: parts.drained,
            workers: parts.workers,
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.finish(),
        };
        let stalled_workers = report.stalled_workers();

        info!(
            run_id = %report.run_id,
            submitted = report.submitted,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            stalled_workers,
            duration_ms = report.duration_ms,
            "Workflow finished"
        );
        publish(
            &*self.events,
            WorkflowEvent::WorkflowCompleted {
                run_id: report.run_id.clone(),
                submitted: report.submitted,
                completed: report.completed,
                retried: report.retried,
                failed: report.failed,
                stalled_workers,
                duration_ms: report.duration_ms,
            },
        )
        .await;

        if !report.is_complete() {
            warn!(
                run_id = %report.run_id,
                submitted = report.submitted,
                completed = report.completed,
                drained = report.drained,
                policy = ?self.config.stall_policy,
                "Workflow finished with missing results"
            );
            if self.config.stall_policy == StallPolicy::Abort {
                return Err(WorkflowError::Incomplete {
                    submitted: report.submitted,
                    completed: report.completed,
                    stalled_workers,
                });
            }
        }

        Ok(report)
    }
}

impl<P, O: fmt::Debug> fmt::Debug for Workflow<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("config", &self.config)
            .field("error_value", &self.error_value)
            .field("streaming", &self.callback.is_some())
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

/// Builds a workflow from `config` and runs `handler` over `items`.
///
/// # Errors
///
/// Returns [`WorkflowError::Config`] before any handler runs if `config`
/// is invalid; otherwise as [`Workflow::run`].
pub async fn run_pipeline<P, O, H>(
    handler: H,
    items: Vec<P>,
    config: WorkflowConfig,
) -> Result<Vec<O>, WorkflowError>
where
    H: Handler<P, O> + 'static,
    P: Clone + Send + Sync + 'static,
    O: Clone + Default + Send + Sync + 'static,
{
    WorkflowBuilder::new(handler).config(config).build()?.run(items).await
}
