//! The worker receive loop.

use super::config::duration_ms;
use super::report::WorkflowMetrics;
use super::retry::RetryBackoff;
use crate::core::{ChannelMessage, ResultRecord, WorkItem, WorkerReport, WorkerState};
use crate::events::{publish, EventSink, WorkflowEvent};
use crate::handler::{invoke, Handler};
use crate::queue::{AckGuard, TaskQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// State shared by every worker of one run.
pub(crate) struct WorkerContext<P, O> {
    pub(crate) run_id: String,
    pub(crate) queue: Arc<TaskQueue<P>>,
    pub(crate) results: mpsc::UnboundedSender<ResultRecord<P, O>>,
    pub(crate) handler: Arc<dyn Handler<P, O>>,
    pub(crate) error_value: O,
    pub(crate) max_retry: u32,
    pub(crate) item_timeout: Option<Duration>,
    pub(crate) idle_timeout: Duration,
    pub(crate) backoff: RetryBackoff,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) metrics: Arc<WorkflowMetrics>,
}

/// Runs one worker until it is told to stop or runs out of patience.
pub(crate) async fn run_worker<P, O>(worker_id: usize, ctx: Arc<WorkerContext<P, O>>) -> WorkerReport
where
    P: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    let mut processed = 0;
    debug!(run_id = %ctx.run_id, worker_id, "Worker started");
    publish(
        &*ctx.events,
        WorkflowEvent::WorkerStarted {
            run_id: ctx.run_id.clone(),
            worker_id,
        },
    )
    .await;

    let state = loop {
        let message = match tokio::time::timeout(ctx.idle_timeout, ctx.queue.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!(run_id = %ctx.run_id, worker_id, "Task queue closed");
                break WorkerState::Terminated;
            }
            Err(_) if ctx.queue.delayed() > 0 => {
                trace!(
                    worker_id,
                    delayed = ctx.queue.delayed(),
                    "Idle, waiting on delayed retries"
                );
                continue;
            }
            Err(_) => break WorkerState::Stalled,
        };

        let item = match message {
            ChannelMessage::Stop => break WorkerState::Terminated,
            ChannelMessage::Work(item) => item,
        };

        let _ack = AckGuard::new(&ctx.queue);
        processed += 1;
        trace!(
            worker_id,
            index = item.index,
            attempt = item.attempt,
            state = %WorkerState::Dispatching,
            "Dispatching item"
        );
        ctx.dispatch(worker_id, item).await;
    };

    match state {
        WorkerState::Stalled => {
            let unfinished = ctx.queue.unfinished();
            warn!(
                run_id = %ctx.run_id,
                worker_id,
                idle_timeout_ms = duration_ms(ctx.idle_timeout),
                unfinished,
                queue_len = ctx.queue.len(),
                "Worker stalled waiting for work"
            );
            ctx.metrics.record_stall();
            publish(
                &*ctx.events,
                WorkflowEvent::WorkerStalled {
                    run_id: ctx.run_id.clone(),
                    worker_id,
                    processed,
                    unfinished,
                },
            )
            .await;
        }
        _ => {
            debug!(run_id = %ctx.run_id, worker_id, processed, "Worker terminated");
            publish(
                &*ctx.events,
                WorkflowEvent::WorkerTerminated {
                    run_id: ctx.run_id.clone(),
                    worker_id,
                    processed,
                },
            )
            .await;
        }
    }

    WorkerReport {
        worker_id,
        state,
        processed,
    }
}

impl<P, O> WorkerContext<P, O>
where
    P: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Runs one attempt and routes its outcome.
    async fn dispatch(&self, worker_id: usize, item: WorkItem<P>) {
        let index = item.index;
        let attempt = item.attempt;

        match invoke(&*self.handler, item.payload.clone(), self.item_timeout).await {
            Ok(outcome) => {
                self.metrics.record_success();
                publish(
                    &*self.events,
                    WorkflowEvent::ItemSucceeded {
                        run_id: self.run_id.clone(),
                        index,
                        attempt,
                    },
                )
                .await;
                self.deliver(ResultRecord::new(index, outcome, item.payload));
            }
            Err(failure) if attempt < self.max_retry => {
                let delay = self.backoff.delay_for(attempt);
                let delay_ms = duration_ms(delay);
                debug!(
                    run_id = %self.run_id,
                    worker_id,
                    index,
                    attempt,
                    kind = failure.kind(),
                    error = %failure,
                    delay_ms,
                    "Item failed, re-enqueueing"
                );
                self.metrics.record_retry();
                publish(
                    &*self.events,
                    WorkflowEvent::ItemRetry {
                        run_id: self.run_id.clone(),
                        index,
                        attempt,
                        kind: failure.kind(),
                        error: failure.to_string(),
                        delay_ms,
                    },
                )
                .await;

                let payload = item.payload.clone();
                if let Err(err) = self.queue.requeue(item.next_attempt(), delay) {
                    warn!(run_id = %self.run_id, index, error = %err, "Could not re-enqueue item");
                    self.metrics.record_failure();
                    self.deliver(ResultRecord::new(index, self.error_value.clone(), payload));
                }
            }
            Err(failure) => {
                warn!(
                    run_id = %self.run_id,
                    worker_id,
                    index,
                    attempts = attempt + 1,
                    kind = failure.kind(),
                    error = %failure,
                    queue_len = self.queue.len(),
                    "Item exhausted retries"
                );
                self.metrics.record_failure();
                publish(
                    &*self.events,
                    WorkflowEvent::ItemFailed {
                        run_id: self.run_id.clone(),
                        index,
                        attempts: attempt + 1,
                        kind: failure.kind(),
                        error: failure.to_string(),
                    },
                )
                .await;
                self.deliver(ResultRecord::new(index, self.error_value.clone(), item.payload));
            }
        }
    }

    fn deliver(&self, record: ResultRecord<P, O>) {
        let index = record.index;
        if self.results.send(record).is_err() {
            debug!(run_id = %self.run_id, index, "Result channel closed, dropping record");
        }
    }
}
