//! Configuration shared by both engines.

use crate::events::{get_event_sink, EventSink};
use std::fmt::Debug;
use std::sync::Arc;

/// Default name given to pipes that were not named explicitly.
pub const DEFAULT_PIPE_NAME: &str = "pipe";

/// Pipe configuration.
#[derive(Clone)]
pub struct PipeConfig {
    /// Name used in log lines and event payloads.
    pub name: String,
    /// Sink for lifecycle events. `None` falls back to the process-wide sink.
    pub event_sink: Option<Arc<dyn EventSink>>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPE_NAME.to_string(),
            event_sink: None,
        }
    }
}

impl Debug for PipeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeConfig")
            .field("name", &self.name)
            .field("event_sink", &self.event_sink.is_some())
            .finish()
    }
}

impl PipeConfig {
    /// Creates a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipe name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a dedicated event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the sink events should go to right now.
    ///
    /// Resolved at execution time so a process-wide sink installed after the
    /// pipe was built still receives its events.
    #[must_use]
    pub fn resolve_sink(&self) -> Arc<dyn EventSink> {
        self.event_sink.clone().unwrap_or_else(get_event_sink)
    }
}
