//! Work items, result records and task channel messages.

use serde::{Deserialize, Serialize};

/// A unit of work travelling through the task channel.
///
/// `index` is the submission position and never changes; `attempt` starts
/// at zero and grows by one on every re-enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem<P> {
    /// Position in submission order, used as the reassembly key.
    pub index: usize,
    /// The caller's payload.
    pub payload: P,
    /// Number of failed attempts so far.
    pub attempt: u32,
}

impl<P> WorkItem<P> {
    /// Creates a first-attempt work item.
    #[must_use]
    pub fn new(index: usize, payload: P) -> Self {
        Self {
            index,
            payload,
            attempt: 0,
        }
    }

    /// Returns the same item scheduled for its next attempt.
    #[must_use]
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self
        }
    }

    /// Returns true if this is the first attempt.
    #[must_use]
    pub fn is_first_attempt(&self) -> bool {
        self.attempt == 0
    }
}

/// A message on the task channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage<P> {
    /// A work item to process.
    Work(WorkItem<P>),
    /// Tells exactly one worker to exit.
    Stop,
}

impl<P> ChannelMessage<P> {
    /// Returns true for the termination signal.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl<P> From<WorkItem<P>> for ChannelMessage<P> {
    fn from(item: WorkItem<P>) -> Self {
        Self::Work(item)
    }
}

/// The terminal outcome for one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord<P, O> {
    /// Submission index of the item.
    pub index: usize,
    /// Handler result, or the sentinel error value.
    pub outcome: O,
    /// The payload the item was submitted with.
    pub payload: P,
}

impl<P, O> ResultRecord<P, O> {
    /// Creates a new result record.
    #[must_use]
    pub fn new(index: usize, outcome: O, payload: P) -> Self {
        Self {
            index,
            outcome,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_starts_at_zero() {
        let item = WorkItem::new(3, "payload");
        assert_eq!(item.index, 3);
        assert_eq!(item.attempt, 0);
        assert!(item.is_first_attempt());
    }

    #[test]
    fn test_next_attempt_keeps_index() {
        let item = WorkItem::new(7, 42).next_attempt().next_attempt();
        assert_eq!(item.index, 7);
        assert_eq!(item.payload, 42);
        assert_eq!(item.attempt, 2);
        assert!(!item.is_first_attempt());
    }

    #[test]
    fn test_channel_message_stop() {
        let stop: ChannelMessage<i32> = ChannelMessage::Stop;
        let work: ChannelMessage<i32> = WorkItem::new(0, 1).into();
        assert!(stop.is_stop());
        assert!(!work.is_stop());
    }
}
