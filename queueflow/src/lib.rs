//! # Queueflow
//!
//! A bounded, retrying, order-preserving async work-distribution engine.
//!
//! Queueflow fans a list of payloads (or a stream of them from an async
//! producer) out to a fixed pool of workers, each of which runs a
//! caller-supplied handler. It provides:
//!
//! - **Backpressure**: the task channel holds a bounded number of first attempts
//! - **Per-item retries**: failures, timeouts and panics are re-enqueued up to a ceiling
//! - **Ordered results**: outcomes come back in input order, or stream to a callback
//! - **Graceful shutdown**: workers stop only after every submitted item is acknowledged
//! - **Stall detection**: idle workers give up and the run reports what is missing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use queueflow::prelude::*;
//!
//! let workflow = WorkflowBuilder::new(|x: u32| async move { Ok::<_, BoxError>(x * 2) })
//!     .worker_count(4)
//!     .max_retry(3)
//!     .build()?;
//!
//! let doubled = workflow.run(vec![1, 2, 3]).await?;
//! assert_eq!(doubled, vec![2, 4, 6]);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod handler;
pub mod observability;
pub mod queue;
pub mod source;
pub mod testing;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{PayloadShape, ResultRecord, WorkItem, WorkerReport, WorkerState};
    pub use crate::errors::{BoxError, ConfigError, HandlerFailure, WorkflowError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, WorkflowEvent,
    };
    pub use crate::handler::{Extras, Handler, ResultCallback};
    pub use crate::observability::{init_tracing, LogFormat, SpanTimer};
    pub use crate::queue::{TaskQueue, TaskSender};
    pub use crate::source::{with_args, ItemSource, Producer};
    pub use crate::workflow::{
        run_pipeline, BackoffStrategy, JitterStrategy, RetryBackoff, StallPolicy, Workflow,
        WorkflowBuilder, WorkflowConfig, WorkflowReport,
    };
}
