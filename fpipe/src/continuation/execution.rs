//! Per-execution state and the continuations handed to steps.

use super::failure::{CallbackFailure, FailureChannel};
use crate::errors::{panic_message, PipeError};
use crate::events::EventSink;
use crate::observability::{ExecutionSummary, SpanTimer};
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A middleware step: receives the current value and the continuations.
pub type Middleware = Arc<dyn Fn(Value, Next) -> anyhow::Result<()> + Send + Sync>;

/// A source step: receives the execution arguments and the completion handle.
pub type Source = Arc<dyn Fn(&[Value], Completion) -> anyhow::Result<()> + Send + Sync>;

/// The caller's completion callback.
pub type FinalCallback = Box<dyn FnOnce(Result<Value, PipeError>) + Send>;

/// State of a single execution. Shared by every continuation of that run.
pub(crate) struct Execution {
    run_id: Uuid,
    pipe: String,
    middleware: Arc<[Middleware]>,
    callback: Mutex<Option<FinalCallback>>,
    failures: Arc<FailureChannel>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    timer: SpanTimer,
}

impl Execution {
    pub(crate) fn start(
        pipe: &str,
        middleware: Arc<[Middleware]>,
        callback: FinalCallback,
        failures: Arc<FailureChannel>,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
    ) -> Arc<Self> {
        let execution = Arc::new(Self {
            run_id: Uuid::new_v4(),
            pipe: pipe.to_string(),
            middleware,
            callback: Mutex::new(Some(callback)),
            failures,
            sink,
            runtime,
            timer: SpanTimer::start(pipe),
        });

        debug!(
            pipe = %execution.pipe,
            run_id = %execution.run_id,
            middleware = execution.middleware.len(),
            "Executing pipe"
        );
        execution.sink.try_emit(
            "pipe.execute.started",
            Some(execution.summary().to_event_data()),
        );
        execution
    }

    pub(crate) fn completion(self: &Arc<Self>) -> Completion {
        Completion {
            execution: Arc::clone(self),
        }
    }

    /// Moves the execution to middleware `index` with `outcome`.
    ///
    /// An error, or running off the end of the middleware, completes the
    /// execution. A middleware that fails synchronously completes it at once.
    /// Once the execution has completed, no further middleware runs.
    pub(crate) fn step(self: &Arc<Self>, index: usize, outcome: Result<Value, PipeError>) {
        if self.is_finished() {
            warn!(
                pipe = %self.pipe,
                run_id = %self.run_id,
                index,
                "Execution already completed; not running further middleware"
            );
            return;
        }

        let value = match outcome {
            Ok(value) if index < self.middleware.len() => value,
            finished => return self.finish(finished),
        };

        let middleware = Arc::clone(&self.middleware[index]);
        let next = Next {
            execution: Arc::clone(self),
            index,
        };

        let error = match catch_unwind(AssertUnwindSafe(|| middleware(value, next))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => PipeError::Step(e),
            Err(payload) => PipeError::from_panic(payload.as_ref()),
        };

        warn!(
            pipe = %self.pipe,
            run_id = %self.run_id,
            index,
            error = %error,
            "Middleware failed"
        );
        self.sink.try_emit(
            "pipe.middleware.failed",
            Some(serde_json::json!({
                "pipe": self.pipe,
                "run_id": self.run_id.to_string(),
                "index": index,
                "error": error.to_string(),
            })),
        );
        self.finish(Err(error));
    }

    /// Hands `outcome` to the final callback. Only the first call does.
    pub(crate) fn finish(&self, outcome: Result<Value, PipeError>) {
        let Some(callback) = self.callback.lock().take() else {
            warn!(
                pipe = %self.pipe,
                run_id = %self.run_id,
                "Execution already completed; ignoring late completion"
            );
            return;
        };

        let summary = self.summary();
        match &outcome {
            Ok(_) => {
                info!(
                    pipe = %self.pipe,
                    run_id = %self.run_id,
                    duration_ms = summary.duration_ms,
                    "Pipe completed"
                );
                self.sink.try_emit("pipe.completed", Some(summary.to_event_data()));
            }
            Err(e) => {
                info!(
                    pipe = %self.pipe,
                    run_id = %self.run_id,
                    error = %e,
                    "Pipe failed"
                );
                self.sink.try_emit(
                    "pipe.failed",
                    Some(summary.with_error(e.to_string()).to_event_data()),
                );
            }
        }

        self.deliver(callback, outcome);
    }

    fn is_finished(&self) -> bool {
        self.callback.lock().is_none()
    }

    /// Calls the final callback, routing a panic to the failure channel.
    fn deliver(&self, callback: FinalCallback, outcome: Result<Value, PipeError>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            let failure = CallbackFailure {
                pipe: self.pipe.clone(),
                run_id: self.run_id.to_string(),
                message: panic_message(payload.as_ref()),
            };
            self.sink.try_emit(
                "pipe.callback_failed",
                serde_json::to_value(&failure).ok(),
            );
            self.failures.publish(&failure);
        }
    }

    fn summary(&self) -> ExecutionSummary {
        ExecutionSummary::new(&self.pipe, self.middleware.len())
            .with_run_id(self.run_id.to_string())
            .with_duration_ms(self.timer.elapsed_ms())
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.get_mut().take() {
            warn!(
                pipe = %self.pipe,
                run_id = %self.run_id,
                "Every continuation was dropped before the pipe completed"
            );
            self.sink.try_emit(
                "pipe.failed",
                Some(
                    self.summary()
                        .with_error(PipeError::Abandoned.to_string())
                        .to_event_data(),
                ),
            );
            self.deliver(callback, Err(PipeError::Abandoned));
        }
    }
}

/// The continuations handed to a middleware.
///
/// Both continuations consume the handle, so a middleware picks exactly one.
/// Neither runs the next step synchronously; the step is spawned onto the
/// runtime so long chains of synchronous middleware never deepen the stack.
pub struct Next {
    execution: Arc<Execution>,
    index: usize,
}

impl Next {
    /// Index of the middleware holding this handle.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves on to the next middleware with `outcome`.
    ///
    /// An `Err` outcome skips every remaining middleware.
    pub fn advance(self, outcome: anyhow::Result<Value>) {
        let Self { execution, index } = self;
        let runtime = execution.runtime.clone();
        runtime.spawn(async move {
            execution.step(index + 1, outcome.map_err(PipeError::Step));
        });
    }

    /// Completes the execution with `outcome`, skipping remaining middleware.
    pub fn terminate(self, outcome: anyhow::Result<Value>) {
        let execution = self.execution;
        let runtime = execution.runtime.clone();
        runtime.spawn(async move {
            execution.finish(outcome.map_err(PipeError::Step));
        });
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("run_id", &self.execution.run_id)
            .field("index", &self.index)
            .finish()
    }
}

/// Completion handle handed to a source.
pub struct Completion {
    execution: Arc<Execution>,
}

impl Completion {
    /// Reports the source's outcome and starts the middleware.
    pub fn complete(self, outcome: anyhow::Result<Value>) {
        self.execution.step(0, outcome.map_err(PipeError::Step));
    }

    /// Run id of the execution this handle belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.execution.run_id
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("run_id", &self.execution.run_id)
            .finish()
    }
}
