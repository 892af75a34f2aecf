//! Workflow builder with validation.

use super::config::{StallPolicy, WorkflowConfig};
use super::orchestrator::Workflow;
use super::retry::RetryBackoff;
use crate::errors::ConfigError;
use crate::events::{EventSink, NoOpEventSink};
use crate::handler::{Handler, ResultCallback};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating validated workflows.
pub struct WorkflowBuilder<P, O> {
    handler: Arc<dyn Handler<P, O>>,
    callback: Option<Arc<dyn ResultCallback<P, O>>>,
    extras: Map<String, Value>,
    error_value: O,
    config: WorkflowConfig,
    events: Arc<dyn EventSink>,
}

impl<P, O: Default> WorkflowBuilder<P, O> {
    /// Creates a builder around `handler`.
    ///
    /// The sentinel for failed items starts as `O::default()`.
    #[must_use]
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler<P, O> + 'static,
    {
        Self {
            handler: Arc::new(handler),
            callback: None,
            extras: Map::new(),
            error_value: O::default(),
            config: WorkflowConfig::default(),
            events: Arc::new(NoOpEventSink),
        }
    }
}

impl<P, O> WorkflowBuilder<P, O> {
    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Sets the retry budget per item.
    #[must_use]
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.config.max_retry = max_retry;
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_item_timeout(timeout);
        self
    }

    /// Sets how long a worker waits for work before stalling.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_idle_timeout(timeout);
        self
    }

    /// Sets the capacity multiplier.
    #[must_use]
    pub fn capacity_multiplier(mut self, multiplier: usize) -> Self {
        self.config.capacity_multiplier = multiplier;
        self
    }

    /// Sets what happens when workers stall and results go missing.
    #[must_use]
    pub fn stall_policy(mut self, policy: StallPolicy) -> Self {
        self.config.stall_policy = policy;
        self
    }

    /// Sets the delay between a failure and its retry.
    #[must_use]
    pub fn retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Sets the outcome recorded for items that exhaust their retries.
    #[must_use]
    pub fn error_value(mut self, value: O) -> Self {
        self.error_value = value;
        self
    }

    /// Switches the workflow to streaming mode.
    #[must_use]
    pub fn callback<C>(mut self, callback: C) -> Self
    where
        C: ResultCallback<P, O> + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Adds a named value passed to every callback invocation.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Sets the sink that receives this workflow's events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the configuration as built so far.
    #[must_use]
    pub fn current_config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Builds the workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. No handler is
    /// invoked before validation passes.
    pub fn build(self) -> Result<Workflow<P, O>, ConfigError> {
        self.config.validate()?;
        Ok(Workflow::new(
            self.handler,
            self.callback,
            Arc::new(self.extras),
            self.error_value,
            self.config,
            self.events,
        ))
    }
}

impl<P, O: fmt::Debug> fmt::Debug for WorkflowBuilder<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("config", &self.config)
            .field("error_value", &self.error_value)
            .field("streaming", &self.callback.is_some())
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}
