//! Core types for queueflow.
//!
//! This module provides the fundamental types used throughout the engine:
//! - Work items and result records
//! - The task channel message type
//! - Payload shapes for argument-style dispatch
//! - Worker lifecycle states

mod item;
mod shape;
mod state;

pub use item::{ChannelMessage, ResultRecord, WorkItem};
pub use shape::PayloadShape;
pub use state::{WorkerReport, WorkerState};
