//! Shutdown coordination.
//!
//! The coordinator feeds the source into the queue, waits on the drain
//! barrier, then sends one stop signal per worker and collects the
//! workers' reports. If every worker exits before the barrier resolves
//! the wait is abandoned, along with any producer still running.

use crate::core::WorkerReport;
use crate::errors::WorkflowError;
use crate::queue::TaskQueue;
use crate::source::ItemSource;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// How a run's shutdown went.
#[derive(Debug)]
pub(crate) struct Shutdown {
    /// Worker reports ordered by worker id.
    pub(crate) workers: Vec<WorkerReport>,
    /// Whether the drain barrier resolved.
    pub(crate) drained: bool,
    /// The source's own result.
    pub(crate) produced: Result<(), WorkflowError>,
}

/// Drives a run from first enqueue to the last worker exit.
pub(crate) async fn coordinate<P: Send + 'static>(
    queue: Arc<TaskQueue<P>>,
    source: ItemSource<P>,
    mut workers: JoinSet<WorkerReport>,
    worker_count: usize,
) -> Result<Shutdown, WorkflowError> {
    let mut reports = Vec::with_capacity(worker_count);

    let drain = async {
        let produced = source.produce(queue.sender()).await;
        if let Err(err) = &produced {
            warn!(error = %err, "Item source failed, draining submitted items");
        }
        queue.join().await;
        produced
    };
    tokio::pin!(drain);

    let produced = loop {
        tokio::select! {
            produced = &mut drain => break Some(produced),
            joined = workers.join_next() => match joined {
                Some(joined) => reports.push(joined.map_err(worker_panicked)?),
                None => break None,
            },
        }
    };

    let drained = produced.is_some();
    let produced = match produced {
        Some(produced) => {
            debug!(submitted = queue.submitted(), "Drain barrier resolved, stopping workers");
            queue.send_stop(worker_count).await?;
            while let Some(joined) = workers.join_next().await {
                reports.push(joined.map_err(worker_panicked)?);
            }
            produced
        }
        None => {
            warn!(
                unfinished = queue.unfinished(),
                submitted = queue.submitted(),
                "Every worker exited before the queue drained"
            );
            Ok(())
        }
    };

    queue.close();
    reports.sort_by_key(|report| report.worker_id);

    Ok(Shutdown {
        workers: reports,
        drained,
        produced,
    })
}

fn worker_panicked(err: JoinError) -> WorkflowError {
    WorkflowError::Internal(format!("worker task failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChannelMessage, WorkerState};
    use std::time::Duration;

    fn spawn_counting_workers(queue: &Arc<TaskQueue<u32>>, count: usize) -> JoinSet<WorkerReport> {
        let mut workers = JoinSet::new();
        for worker_id in 0..count {
            let queue = Arc::clone(queue);
            workers.spawn(async move {
                let mut processed = 0;
                let state = loop {
                    match tokio::time::timeout(Duration::from_millis(100), queue.recv()).await {
                        Ok(Some(ChannelMessage::Work(_))) => {
                            processed += 1;
                            queue.task_done();
                        }
                        Ok(Some(ChannelMessage::Stop) | None) => break WorkerState::Terminated,
                        Err(_) => break WorkerState::Stalled,
                    }
                };
                WorkerReport {
                    worker_id,
                    state,
                    processed,
                }
            });
        }
        workers
    }

    #[tokio::test]
    async fn test_coordinate_drains_then_stops() {
        let queue = TaskQueue::new(4);
        let workers = spawn_counting_workers(&queue, 2);

        let shutdown = coordinate(Arc::clone(&queue), ItemSource::Static(vec![1, 2, 3, 4, 5]), workers, 2)
            .await
            .unwrap();

        assert!(shutdown.drained);
        assert!(shutdown.produced.is_ok());
        assert_eq!(shutdown.workers.len(), 2);
        assert_eq!(shutdown.workers[0].worker_id, 0);
        assert!(shutdown.workers.iter().all(|w| w.state == WorkerState::Terminated));
        assert_eq!(shutdown.workers.iter().map(|w| w.processed).sum::<usize>(), 5);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_coordinate_gives_up_when_all_workers_stall() {
        let queue = TaskQueue::new(4);
        let workers = spawn_counting_workers(&queue, 2);
        let source = ItemSource::producer(|tasks: crate::queue::TaskSender<u32>| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            tasks.put(0, 1).await
        });

        let shutdown = coordinate(Arc::clone(&queue), source, workers, 2).await.unwrap();

        assert!(!shutdown.drained);
        assert!(shutdown.workers.iter().all(|w| w.state == WorkerState::Stalled));
        assert_eq!(queue.submitted(), 0);
    }

    #[tokio::test]
    async fn test_coordinate_reports_producer_failure() {
        let queue = TaskQueue::new(4);
        let workers = spawn_counting_workers(&queue, 2);
        let source = ItemSource::producer(|tasks: crate::queue::TaskSender<u32>| async move {
            tasks.put(0, 1).await?;
            Err::<(), _>(WorkflowError::Internal("boom".to_string()))
        });

        let shutdown = coordinate(Arc::clone(&queue), source, workers, 2).await.unwrap();

        assert!(shutdown.drained);
        assert!(matches!(shutdown.produced, Err(WorkflowError::Producer(_))));
        assert_eq!(shutdown.workers.iter().map(|w| w.processed).sum::<usize>(), 1);
    }
}
