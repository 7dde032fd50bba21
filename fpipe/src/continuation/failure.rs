//! Side channel for failures of the caller's completion callback.

use crate::errors::panic_message;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// A completion callback panicked while the engine was delivering a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackFailure {
    /// Name of the pipe whose callback failed.
    pub pipe: String,
    /// Run id of the execution.
    pub run_id: String,
    /// The panic payload rendered as text.
    pub message: String,
}

/// A subscriber to callback failures.
pub type FailureHandler = Arc<dyn Fn(&CallbackFailure) + Send + Sync>;

/// Subscribers to callback failures of one pipe.
///
/// While nobody is subscribed, failures fall into the default trap, which
/// logs them. The first subscription takes over from the trap.
#[derive(Default)]
pub struct FailureChannel {
    handlers: RwLock<Vec<FailureHandler>>,
}

impl FailureChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber.
    pub fn subscribe(&self, handler: FailureHandler) {
        self.handlers.write().push(handler);
    }

    /// Returns the number of subscribers. The default trap is not counted.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Copies the subscribers into a new, independent channel.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            handlers: RwLock::new(self.handlers.read().clone()),
        }
    }

    /// Delivers a failure to every subscriber, or to the default trap.
    ///
    /// A panicking subscriber is logged and does not stop delivery.
    pub fn publish(&self, failure: &CallbackFailure) {
        let handlers = self.handlers.read().clone();
        if handlers.is_empty() {
            error!(
                pipe = %failure.pipe,
                run_id = %failure.run_id,
                message = %failure.message,
                "Completion callback panicked"
            );
            return;
        }

        for handler in &handlers {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(failure);
            })) {
                warn!(
                    pipe = %failure.pipe,
                    "Callback failure subscriber panicked: {}",
                    panic_message(e.as_ref())
                );
            }
        }
    }
}

impl std::fmt::Debug for FailureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
