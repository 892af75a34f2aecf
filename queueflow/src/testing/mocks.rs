//! Mock handlers and callbacks for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::core::ResultRecord;
use crate::errors::BoxError;
use crate::handler::{Extras, Handler, ResultCallback};

/// A handler that returns its payload unchanged and counts calls.
#[derive(Debug, Default)]
pub struct EchoHandler {
    call_count: Mutex<usize>,
}

impl EchoHandler {
    /// Creates a new echo handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl<P> Handler<P, P> for EchoHandler
where
    P: Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<P, BoxError> {
        *self.call_count.lock() += 1;
        Ok(payload)
    }
}

/// A handler that fails the first `failures` calls for each payload, then
/// echoes it.
#[derive(Debug)]
pub struct FlakyHandler<P> {
    failures: u32,
    calls: Mutex<HashMap<P, u32>>,
}

impl<P: Hash + Eq> FlakyHandler<P> {
    /// Creates a handler that fails `failures` times per payload.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Returns how many times `payload` was handled.
    #[must_use]
    pub fn calls_for(&self, payload: &P) -> u32 {
        self.calls.lock().get(payload).copied().unwrap_or(0)
    }

    /// Returns the total number of calls.
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl<P> Handler<P, P> for FlakyHandler<P>
where
    P: Hash + Eq + Clone + Send + Sync + 'static,
{
    async fn handle(&self, payload: P) -> Result<P, BoxError> {
        let seen = {
            let mut calls = self.calls.lock();
            let count = calls.entry(payload.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if seen <= self.failures {
            Err(format!("flaky failure {seen} of {}", self.failures).into())
        } else {
            Ok(payload)
        }
    }
}

/// A handler that always fails.
#[derive(Debug)]
pub struct FailingHandler {
    error: String,
    call_count: Mutex<usize>,
}

impl FailingHandler {
    /// Creates a new failing handler.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            call_count: Mutex::new(0),
        }
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl<P, O> Handler<P, O> for FailingHandler
where
    P: Send + 'static,
    O: Send + 'static,
{
    async fn handle(&self, _payload: P) -> Result<O, BoxError> {
        *self.call_count.lock() += 1;
        Err(self.error.clone().into())
    }
}

/// A handler that sleeps before echoing its payload.
#[derive(Debug, Clone, Copy)]
pub struct SlowHandler {
    delay: Duration,
}

impl SlowHandler {
    /// Creates a handler that takes `delay` per call.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl<P> Handler<P, P> for SlowHandler
where
    P: Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<P, BoxError> {
        tokio::time::sleep(self.delay).await;
        Ok(payload)
    }
}

/// A callback that records every record and the extras it was given.
///
/// Clones share the same recording, so a test can keep one handle and
/// give another to the workflow.
#[derive(Debug)]
pub struct RecordingCallback<P, O> {
    records: Arc<Mutex<Vec<ResultRecord<P, O>>>>,
    extras: Arc<Mutex<Vec<Extras>>>,
}

impl<P, O> Clone for RecordingCallback<P, O> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            extras: Arc::clone(&self.extras),
        }
    }
}

impl<P, O> Default for RecordingCallback<P, O> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            extras: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<P: Clone, O: Clone> RecordingCallback<P, O> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<ResultRecord<P, O>> {
        self.records.lock().clone()
    }

    /// Returns the recorded indices, sorted.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.records.lock().iter().map(|r| r.index).collect();
        indices.sort_unstable();
        indices
    }

    /// Returns the number of callback invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if the callback was never invoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Returns the extras passed on each invocation.
    #[must_use]
    pub fn extras(&self) -> Vec<Extras> {
        self.extras.lock().clone()
    }
}

#[async_trait]
impl<P, O> ResultCallback<P, O> for RecordingCallback<P, O>
where
    P: Send + 'static,
    O: Send + 'static,
{
    async fn on_result(&self, record: ResultRecord<P, O>, extras: Extras) -> Result<(), BoxError> {
        self.records.lock().push(record);
        self.extras.lock().push(extras);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_handler() {
        let handler = EchoHandler::new();
        let out: &str = handler.handle("x").await.unwrap();
        assert_eq!(out, "x");
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn test_flaky_handler_counts_per_payload() {
        let handler = FlakyHandler::new(2);
        assert!(handler.handle(7).await.is_err());
        assert!(handler.handle(8).await.is_err());
        assert!(handler.handle(7).await.is_err());
        assert_eq!(handler.handle(7).await.unwrap(), 7);
        assert_eq!(handler.calls_for(&7), 3);
        assert_eq!(handler.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_failing_handler() {
        let handler = FailingHandler::new("nope");
        let err = Handler::<u8, u8>::handle(&handler, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn test_recording_callback() {
        let recorder = RecordingCallback::<&str, i32>::new();
        let callback = recorder.clone();
        callback
            .on_result(ResultRecord::new(1, 10, "b"), Extras::default())
            .await
            .unwrap();
        callback
            .on_result(ResultRecord::new(0, 0, "a"), Extras::default())
            .await
            .unwrap();

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.indices(), vec![0, 1]);
        assert_eq!(recorder.records()[0].payload, "b");
    }
}
