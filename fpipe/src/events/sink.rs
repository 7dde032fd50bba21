//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

/// Trait for sinks that receive pipe lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "pipe.completed")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without blocking.
    ///
    /// Called from the continuation engine's synchronous stepping path, so
    /// it must never panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Returns true for events reporting that something went wrong:
/// `pipe.failed`, `pipe.middleware.failed`, `pipe.callback_failed` and
/// `fpipe.process.failed`.
#[must_use]
pub fn is_failure_event(event_type: &str) -> bool {
    event_type.ends_with(".failed") || event_type.ends_with("_failed")
}

/// Discards every event. The default process-wide sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Forwards events to `tracing`: failures at `warn`, the rest at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    fn log_event(event_type: &str, data: Option<&Value>) {
        let pipe = data
            .and_then(|d| d.get("pipe"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if is_failure_event(event_type) {
            warn!(event_type, pipe, event_data = ?data, "Pipe event");
        } else {
            debug!(event_type, pipe, event_data = ?data, "Pipe event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }
}

/// An event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event type, e.g. `fpipe.process.completed`.
    pub event_type: String,
    /// Payload, usually an execution summary.
    pub data: Option<Value>,
}

impl RecordedEvent {
    /// Returns true if this event reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        is_failure_event(&self.event_type)
    }
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Returns the event types, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns the events of exactly `event_type`.
    #[must_use]
    pub fn named(&self, event_type: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Counts the events of exactly `event_type`.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Returns the failure events.
    #[must_use]
    pub fn failures(&self) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.is_failure())
            .cloned()
            .collect()
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    fn record(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }
}
