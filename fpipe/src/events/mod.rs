//! Event sinks for pipeline lifecycle events.
//!
//! Both engines report what happens during an execution (start, step failure,
//! completion, callback failure) to an [`EventSink`]. A pipe without its own
//! sink reports to the process-wide sink configured here.

mod sink;

pub use sink::{
    is_failure_event, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    RecordedEvent,
};

use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the process-wide event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
