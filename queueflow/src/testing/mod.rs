//! Testing utilities for queueflow workflows.
//!
//! This module provides:
//! - Mock handlers and a recording callback
//! - Assertions over run reports

mod assertions;
mod mocks;

pub use assertions::{assert_complete, assert_counts, assert_no_stalls, assert_outcomes};
pub use mocks::{EchoHandler, FailingHandler, FlakyHandler, RecordingCallback, SlowHandler};
