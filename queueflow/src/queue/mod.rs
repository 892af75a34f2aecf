//! The task queue shared by the item source, workers and coordinator.
//!
//! This module provides:
//! - A bounded task channel with a merged unbounded retry path
//! - An unfinished-work counter backing the drain barrier
//! - The producer-facing `TaskSender` handle

mod task_queue;

pub use task_queue::{TaskQueue, TaskSender};
pub(crate) use task_queue::AckGuard;
