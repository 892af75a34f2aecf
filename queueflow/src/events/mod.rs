//! Event sink system for workflow telemetry.
//!
//! Each workflow is given its own sink at build time, so tests can capture
//! diagnostics for a single run without touching global state.

mod event;
mod sink;

pub use event::WorkflowEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emits a typed event through `sink`.
pub async fn publish(sink: &dyn EventSink, event: WorkflowEvent) {
    sink.emit(event.event_type(), Some(event.data())).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_uses_event_type() {
        let sink = CollectingEventSink::new();
        publish(
            &sink,
            WorkflowEvent::WorkerStarted {
                run_id: "r".to_string(),
                worker_id: 1,
            },
        )
        .await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "worker.started");
        assert_eq!(events[0].1.as_ref().unwrap()["worker_id"], 1);
    }
}
