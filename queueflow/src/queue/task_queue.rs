//! Bounded task channel with a merged retry path and a drain barrier.

use crate::core::{ChannelMessage, WorkItem};
use crate::errors::WorkflowError;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// The task queue feeding a worker pool.
///
/// First attempts go through a bounded channel, so producers suspend when
/// it is full. Re-enqueued items go through an unbounded retry channel that
/// receivers drain first; a retry therefore never waits on capacity and
/// cannot wedge the pool while producers keep the bounded side full.
///
/// Every enqueue bumps an unfinished-work counter and every
/// acknowledgement lowers it. [`join`](Self::join) resolves once the counter
/// is back at zero.
pub struct TaskQueue<P> {
    tasks_tx: async_channel::Sender<ChannelMessage<P>>,
    tasks_rx: async_channel::Receiver<ChannelMessage<P>>,
    retry_tx: async_channel::Sender<WorkItem<P>>,
    retry_rx: async_channel::Receiver<WorkItem<P>>,
    unfinished: watch::Sender<usize>,
    submitted: AtomicUsize,
    delayed: AtomicUsize,
    capacity: usize,
}

impl<P> TaskQueue<P> {
    /// Creates a queue whose bounded side holds `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (tasks_tx, tasks_rx) = async_channel::bounded(capacity);
        let (retry_tx, retry_rx) = async_channel::unbounded();
        let (unfinished, _) = watch::channel(0);

        Arc::new(Self {
            tasks_tx,
            tasks_rx,
            retry_tx,
            retry_rx,
            unfinished,
            submitted: AtomicUsize::new(0),
            delayed: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Returns a producer handle for this queue.
    #[must_use]
    pub fn sender(self: &Arc<Self>) -> TaskSender<P> {
        TaskSender {
            queue: Arc::clone(self),
        }
    }

    /// Capacity of the bounded task channel.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages waiting in either channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks_rx.len() + self.retry_rx.len()
    }

    /// Returns true if no messages are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items enqueued or re-enqueued but not yet acknowledged.
    #[must_use]
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    /// Number of first-attempt items accepted so far.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Retries still waiting out their backoff delay.
    ///
    /// These items are unfinished but sit in neither channel, so a receiver
    /// that sees nothing may still have work coming.
    #[must_use]
    pub fn delayed(&self) -> usize {
        self.delayed.load(Ordering::Acquire)
    }

    /// Returns true once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tasks_tx.is_closed()
    }

    /// Acknowledges one dequeued item.
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Waits until every enqueued item has been acknowledged.
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // The sender lives in `self`, so this only fails if the queue is gone.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Closes both channels. Pending and future enqueues fail.
    pub fn close(&self) {
        self.tasks_tx.close();
        self.retry_tx.close();
    }

    fn add_unfinished(&self) {
        self.unfinished.send_modify(|n| *n += 1);
    }

    fn push_retry(&self, item: WorkItem<P>) -> Result<(), WorkflowError> {
        if self.retry_tx.try_send(item).is_err() {
            self.task_done();
            return Err(WorkflowError::QueueClosed);
        }
        Ok(())
    }
}

impl<P: Send + 'static> TaskQueue<P> {
    /// Enqueues a first-attempt item, suspending while the channel is full.
    pub async fn put(&self, item: WorkItem<P>) -> Result<(), WorkflowError> {
        self.add_unfinished();
        // Releases the slot if the send fails or this future is dropped.
        let slot = AckGuard::new(self);
        self.tasks_tx
            .send(ChannelMessage::Work(item))
            .await
            .map_err(|_| WorkflowError::QueueClosed)?;
        slot.disarm();
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Re-enqueues an item for another attempt after `delay`.
    ///
    /// The item counts as unfinished from this call on, including while
    /// the delay elapses.
    pub fn requeue(self: &Arc<Self>, item: WorkItem<P>, delay: Duration) -> Result<(), WorkflowError> {
        self.add_unfinished();
        if delay.is_zero() {
            return self.push_retry(item);
        }

        self.delayed.fetch_add(1, Ordering::AcqRel);
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let index = item.index;
            if queue.push_retry(item).is_err() {
                debug!(index, "Dropped delayed retry, queue closed");
            }
            // Visible in the retry channel before it stops counting as delayed.
            queue.delayed.fetch_sub(1, Ordering::AcqRel);
        });
        Ok(())
    }

    /// Receives the next message, preferring pending retries.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<ChannelMessage<P>> {
        tokio::select! {
            biased;
            Ok(item) = self.retry_rx.recv() => Some(ChannelMessage::Work(item)),
            message = self.tasks_rx.recv() => message.ok(),
        }
    }

    /// Injects `count` termination signals.
    pub async fn send_stop(&self, count: usize) -> Result<(), WorkflowError> {
        for _ in 0..count {
            self.tasks_tx
                .send(ChannelMessage::Stop)
                .await
                .map_err(|_| WorkflowError::QueueClosed)?;
        }
        Ok(())
    }
}

impl<P> fmt::Debug for TaskQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("unfinished", &self.unfinished())
            .field("submitted", &self.submitted())
            .field("delayed", &self.delayed())
            .finish()
    }
}

/// Producer-facing handle to a [`TaskQueue`].
pub struct TaskSender<P> {
    queue: Arc<TaskQueue<P>>,
}

impl<P> Clone for TaskSender<P> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<P> fmt::Debug for TaskSender<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSender").field("queue", &self.queue).finish()
    }
}

impl<P: Send + 'static> TaskSender<P> {
    /// Enqueues `(index, payload, 0)`, suspending while the channel is full.
    ///
    /// Indices are caller-defined and should be unique within a run; a
    /// repeated index overwrites the earlier result.
    pub async fn put(&self, index: usize, payload: P) -> Result<(), WorkflowError> {
        self.queue.put(WorkItem::new(index, payload)).await
    }
}

impl<P> TaskSender<P> {
    /// Capacity of the underlying task channel.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of messages waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no messages are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns true once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Acknowledges a dequeued item when dropped, on every exit path.
pub(crate) struct AckGuard<'a, P> {
    queue: &'a TaskQueue<P>,
    armed: bool,
}

impl<'a, P> AckGuard<'a, P> {
    pub(crate) fn new(queue: &'a TaskQueue<P>) -> Self {
        Self { queue, armed: true }
    }

    /// Keeps the slot counted.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<P> Drop for AckGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.task_done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_join_on_empty_queue_resolves() {
        let queue = TaskQueue::<i32>::new(4);
        tokio::time::timeout(SHORT, queue.join())
            .await
            .expect("join should resolve immediately");
    }

    #[tokio::test]
    async fn test_join_waits_for_acknowledgement() {
        let queue = TaskQueue::new(4);
        queue.put(WorkItem::new(0, "a")).await.unwrap();
        assert_eq!(queue.unfinished(), 1);
        assert_eq!(queue.submitted(), 1);

        let message = queue.recv().await.unwrap();
        assert_eq!(message, ChannelMessage::Work(WorkItem::new(0, "a")));
        assert!(tokio::time::timeout(SHORT, queue.join()).await.is_err());

        drop(AckGuard::new(&*queue));
        tokio::time::timeout(SHORT, queue.join())
            .await
            .expect("join should resolve after ack");
    }

    #[tokio::test]
    async fn test_recv_prefers_retries() {
        let queue = TaskQueue::new(4);
        queue.put(WorkItem::new(0, 'a')).await.unwrap();
        queue
            .requeue(WorkItem::new(1, 'b').next_attempt(), Duration::ZERO)
            .unwrap();

        match queue.recv().await {
            Some(ChannelMessage::Work(item)) => {
                assert_eq!(item.index, 1);
                assert_eq!(item.attempt, 1);
            }
            other => panic!("expected retry first, got {other:?}"),
        }
        assert_eq!(queue.unfinished(), 2);
        assert_eq!(queue.submitted(), 1);
    }

    #[tokio::test]
    async fn test_put_suspends_when_full() {
        let queue = TaskQueue::new(1);
        queue.put(WorkItem::new(0, 0)).await.unwrap();

        let blocked = tokio::time::timeout(SHORT, queue.put(WorkItem::new(1, 1))).await;
        assert!(blocked.is_err(), "second put should wait for capacity");

        // The abandoned put gives its slot back.
        assert_eq!(queue.unfinished(), 1);
        assert_eq!(queue.submitted(), 1);
    }

    #[tokio::test]
    async fn test_retry_ignores_capacity() {
        let queue = TaskQueue::new(1);
        queue.put(WorkItem::new(0, 0)).await.unwrap();
        for index in 1..10 {
            queue
                .requeue(WorkItem::new(index, index).next_attempt(), Duration::ZERO)
                .unwrap();
        }
        assert_eq!(queue.len(), 10);
    }

    #[tokio::test]
    async fn test_delayed_retry_holds_drain_barrier() {
        let queue = TaskQueue::new(2);
        queue
            .requeue(WorkItem::new(0, "late"), Duration::from_millis(30))
            .unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.unfinished(), 1);

        let message = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .unwrap();
        assert!(matches!(message, Some(ChannelMessage::Work(_))));
    }

    #[tokio::test]
    async fn test_delayed_retry_counted_until_visible() {
        let queue = TaskQueue::new(2);
        queue
            .requeue(WorkItem::new(0, "late"), Duration::from_millis(30))
            .unwrap();
        assert_eq!(queue.delayed(), 1);

        let message = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .unwrap();
        assert!(matches!(message, Some(ChannelMessage::Work(_))));
        tokio::task::yield_now().await;
        assert_eq!(queue.delayed(), 0);

        queue.requeue(WorkItem::new(1, "now"), Duration::ZERO).unwrap();
        assert_eq!(queue.delayed(), 0);
    }

    #[tokio::test]
    async fn test_stop_signals() {
        let queue = TaskQueue::<u8>::new(4);
        queue.send_stop(3).await.unwrap();
        for _ in 0..3 {
            assert_eq!(queue.recv().await, Some(ChannelMessage::Stop));
        }
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_puts() {
        let queue = TaskQueue::new(4);
        let sender = queue.sender();
        queue.close();

        assert!(sender.is_closed());
        assert!(matches!(
            sender.put(0, "x").await,
            Err(WorkflowError::QueueClosed)
        ));
        assert!(queue
            .requeue(WorkItem::new(0, "x"), Duration::ZERO)
            .is_err());
        assert_eq!(queue.unfinished(), 0);
        assert_eq!(queue.recv().await, None);
    }
}
