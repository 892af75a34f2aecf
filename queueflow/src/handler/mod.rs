//! Handler and callback traits.
//!
//! Handlers are the per-item units of work a workflow fans out; callbacks
//! receive completed results in streaming mode. Both are implemented for
//! async closures, so most callers never name the traits.

mod invoke;

pub(crate) use invoke::invoke;

use crate::core::ResultRecord;
use crate::errors::BoxError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Extra named values handed to every callback invocation.
pub type Extras = Arc<Map<String, Value>>;

/// Trait for per-item handlers.
///
/// A handler is invoked once per attempt with its own copy of the payload.
#[async_trait]
pub trait Handler<P, O>: Send + Sync {
    /// Processes one payload.
    async fn handle(&self, payload: P) -> Result<O, BoxError>;
}

#[async_trait]
impl<P, O, E, F, Fut> Handler<P, O> for F
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, E>> + Send,
    E: Into<BoxError>,
    P: Send + 'static,
    O: Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<O, BoxError> {
        (self)(payload).await.map_err(Into::into)
    }
}

/// Trait for streaming result callbacks.
///
/// Called exactly once per completed index, as soon as the record is
/// available.
#[async_trait]
pub trait ResultCallback<P, O>: Send + Sync {
    /// Receives one completed record.
    async fn on_result(&self, record: ResultRecord<P, O>, extras: Extras) -> Result<(), BoxError>;
}

#[async_trait]
impl<P, O, E, F, Fut> ResultCallback<P, O> for F
where
    F: Fn(ResultRecord<P, O>, Extras) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Into<BoxError>,
    P: Send + 'static,
    O: Send + 'static,
{
    async fn on_result(&self, record: ResultRecord<P, O>, extras: Extras) -> Result<(), BoxError> {
        (self)(record, extras).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = |x: i32| async move { Ok::<_, BoxError>(x * 2) };
        assert_eq!(handler.handle(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_closure_handler_error() {
        let handler = |x: i32| async move {
            if x < 0 {
                Err(BoxError::from("negative"))
            } else {
                Ok(x)
            }
        };
        let err = handler.handle(-1).await.unwrap_err();
        assert_eq!(err.to_string(), "negative");
    }

    #[tokio::test]
    async fn test_closure_callback_sees_extras() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |record: ResultRecord<&'static str, usize>, extras: Extras| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push((record.index, record.outcome, extras.get("tag").cloned()));
                Ok::<_, BoxError>(())
            }
        };

        let mut extras = Map::new();
        extras.insert("tag".to_string(), Value::from("batch-1"));
        callback
            .on_result(ResultRecord::new(4, 9, "p"), Arc::new(extras))
            .await
            .unwrap();

        assert_eq!(seen.lock().as_slice(), &[(4, 9, Some(Value::from("batch-1")))]);
    }
}
