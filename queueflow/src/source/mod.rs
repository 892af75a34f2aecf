//! Item sources: where work items come from.
//!
//! A workflow is fed either from a fixed list, enqueued in index order, or
//! from a caller-supplied async producer that owns all enqueueing.

use crate::errors::{BoxError, WorkflowError};
use crate::queue::TaskSender;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Trait for dynamic item producers.
///
/// The producer enqueues `(index, payload)` pairs through the sender and
/// returns when it has nothing more to submit. Indices are the producer's
/// choice and should be unique.
#[async_trait]
pub trait Producer<P>: Send + Sync {
    /// Enqueues every item for the run.
    async fn produce(&self, tasks: TaskSender<P>) -> Result<(), BoxError>;
}

#[async_trait]
impl<P, E, F, Fut> Producer<P> for F
where
    F: Fn(TaskSender<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Into<BoxError>,
    P: Send + 'static,
{
    async fn produce(&self, tasks: TaskSender<P>) -> Result<(), BoxError> {
        (self)(tasks).await.map_err(Into::into)
    }
}

/// A producer bound to a set of arguments.
///
/// The arguments are cloned into every run.
pub struct WithArgs<F, A> {
    func: F,
    args: A,
}

/// Binds `args` to a producer function taking `(tasks, args)`.
pub fn with_args<F, A>(func: F, args: A) -> WithArgs<F, A> {
    WithArgs { func, args }
}

#[async_trait]
impl<P, A, E, F, Fut> Producer<P> for WithArgs<F, A>
where
    F: Fn(TaskSender<P>, A) -> Fut + Send + Sync,
    A: Clone + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Into<BoxError>,
    P: Send + 'static,
{
    async fn produce(&self, tasks: TaskSender<P>) -> Result<(), BoxError> {
        (self.func)(tasks, self.args.clone()).await.map_err(Into::into)
    }
}

impl<F, A: fmt::Debug> fmt::Debug for WithArgs<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithArgs").field("args", &self.args).finish()
    }
}

/// Where a run's items come from.
pub enum ItemSource<P> {
    /// A fixed list; item `i` gets index `i`.
    Static(Vec<P>),
    /// A producer that enqueues items itself.
    Dynamic(Arc<dyn Producer<P>>),
}

impl<P> ItemSource<P> {
    /// Wraps a producer.
    pub fn producer(producer: impl Producer<P> + 'static) -> Self {
        Self::Dynamic(Arc::new(producer))
    }

    /// Number of items, when known up front.
    #[must_use]
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Self::Static(items) => Some(items.len()),
            Self::Dynamic(_) => None,
        }
    }
}

impl<P: Send + 'static> ItemSource<P> {
    /// Feeds every item into the queue.
    pub(crate) async fn produce(self, tasks: TaskSender<P>) -> Result<(), WorkflowError> {
        match self {
            Self::Static(items) => {
                for (index, payload) in items.into_iter().enumerate() {
                    tasks.put(index, payload).await?;
                }
                Ok(())
            }
            Self::Dynamic(producer) => producer
                .produce(tasks)
                .await
                .map_err(WorkflowError::Producer),
        }
    }
}

impl<P> From<Vec<P>> for ItemSource<P> {
    fn from(items: Vec<P>) -> Self {
        Self::Static(items)
    }
}

impl<P> fmt::Debug for ItemSource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(items) => f.debug_tuple("Static").field(&items.len()).finish(),
            Self::Dynamic(_) => f.debug_tuple("Dynamic").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelMessage;
    use crate::queue::TaskQueue;

    async fn drain(queue: &TaskQueue<String>) -> Vec<(usize, String)> {
        let mut items = Vec::new();
        while !queue.is_empty() {
            if let Some(ChannelMessage::Work(item)) = queue.recv().await {
                items.push((item.index, item.payload));
            }
        }
        items
    }

    #[tokio::test]
    async fn test_static_source_enqueues_in_order() {
        let queue = TaskQueue::new(8);
        let source = ItemSource::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(source.known_len(), Some(2));

        source.produce(queue.sender()).await.unwrap();
        assert_eq!(
            drain(&queue).await,
            vec![(0, "a".to_string()), (1, "b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_producer_with_args() {
        let queue = TaskQueue::new(8);
        let producer = with_args(
            |tasks: TaskSender<String>, (prefix, count): (String, usize)| async move {
                for i in 0..count {
                    tasks.put(100 + i, format!("{prefix}-{i}")).await?;
                }
                Ok::<_, WorkflowError>(())
            },
            ("job".to_string(), 2),
        );
        let source = ItemSource::producer(producer);
        assert_eq!(source.known_len(), None);

        source.produce(queue.sender()).await.unwrap();
        assert_eq!(
            drain(&queue).await,
            vec![(100, "job-0".to_string()), (101, "job-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_producer_error_is_reported() {
        let queue = TaskQueue::<String>::new(8);
        let source = ItemSource::producer(|_tasks: TaskSender<String>| async move {
            Err::<(), _>(BoxError::from("upstream unavailable"))
        });

        let err = source.produce(queue.sender()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Producer(_)));
        assert!(err.to_string().contains("upstream unavailable"));
    }
}
