//! Workflow building and execution.
//!
//! This module provides:
//! - Workflow configuration and retry backoff
//! - The workflow builder with validation
//! - The worker pool, shutdown coordinator and result aggregator
//! - Run reports and metrics

mod aggregator;
mod builder;
mod config;
mod coordinator;
mod orchestrator;
mod report;
mod retry;
mod worker;


pub use builder::WorkflowBuilder;
pub use config::{
    StallPolicy, WorkflowConfig, MIN_CAPACITY_MULTIPLIER, MIN_MAX_RETRY, MIN_WORKER_COUNT,
};
pub use orchestrator::{run_pipeline, Workflow};
pub use report::{WorkflowMetrics, WorkflowReport};
pub use retry::{BackoffStrategy, JitterStrategy, RetryBackoff};
