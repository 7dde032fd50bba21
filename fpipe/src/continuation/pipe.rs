//! The continuation-style pipe.

use super::execution::{Completion, Execution, Middleware, Next, Source};
use super::failure::{CallbackFailure, FailureChannel};
use crate::config::PipeConfig;
use crate::errors::PipeError;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::warn;

/// A source followed by an ordered list of middleware.
///
/// The source produces the initial value through its [`Completion`]; each
/// middleware then either advances to the next one or terminates the
/// execution through its [`Next`] handle. The first error skips everything
/// after it and goes straight to the completion callback.
#[derive(Default)]
pub struct Pipe {
    source: Option<Source>,
    middleware: Vec<Middleware>,
    failures: Arc<FailureChannel>,
    config: PipeConfig,
}

impl Pipe {
    /// Creates a pipe without a source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipe over `source`.
    pub fn with_source<F>(source: F) -> Self
    where
        F: Fn(&[Value], Completion) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut pipe = Self::new();
        pipe.source(source);
        pipe
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the pipe name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_name(name);
        self
    }

    /// Returns the pipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Appends a middleware step.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(Value, Next) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the source.
    pub fn source<F>(&mut self, source: F) -> &mut Self
    where
        F: Fn(&[Value], Completion) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Removes the source. Executing afterwards fails until a new one is set.
    pub fn clear_source(&mut self) -> &mut Self {
        self.source = None;
        self
    }

    /// Returns true if a source is configured.
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Returns the number of middleware steps.
    #[must_use]
    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }

    /// Subscribes to panics raised by completion callbacks.
    ///
    /// Until the first subscription, such panics are only logged.
    pub fn on_callback_failure<F>(&self, handler: F) -> &Self
    where
        F: Fn(&CallbackFailure) + Send + Sync + 'static,
    {
        self.failures.subscribe(Arc::new(handler));
        self
    }

    /// Returns the number of callback-failure subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.failures.subscriber_count()
    }

    /// Clones this pipe over a different source.
    #[must_use]
    pub fn fork<F>(&self, source: F) -> Self
    where
        F: Fn(&[Value], Completion) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut pipe = self.clone();
        pipe.source(source);
        pipe
    }

    /// Executes the pipe.
    ///
    /// The source is called with `args` and a completion handle. `callback`
    /// receives the final outcome exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::NoSource`] if no source is configured and
    /// [`PipeError::NoRuntime`] outside a tokio runtime. In both cases no
    /// step runs and `callback` is dropped without being called.
    pub fn execute<C>(&self, callback: C, args: Vec<Value>) -> Result<&Self, PipeError>
    where
        C: FnOnce(Result<Value, PipeError>) + Send + 'static,
    {
        let source = self.source.as_ref().ok_or(PipeError::NoSource)?;
        let runtime = Handle::try_current().map_err(|_| PipeError::NoRuntime)?;

        let execution = Execution::start(
            &self.config.name,
            Arc::from(self.middleware.clone()),
            Box::new(callback),
            Arc::clone(&self.failures),
            self.config.resolve_sink(),
            runtime,
        );

        let completion = execution.completion();
        let error = match catch_unwind(AssertUnwindSafe(|| source(args.as_slice(), completion))) {
            Ok(Ok(())) => return Ok(self),
            Ok(Err(e)) => PipeError::Step(e),
            Err(payload) => PipeError::from_panic(payload.as_ref()),
        };

        warn!(pipe = %self.config.name, error = %error, "Source failed");
        execution.finish(Err(error));
        Ok(self)
    }

    /// Executes the pipe and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns the configuration error from [`Pipe::execute`] or the failure
    /// that ended the execution.
    pub async fn run(&self, args: Vec<Value>) -> Result<Value, PipeError> {
        let (tx, rx) = oneshot::channel();
        self.execute(
            move |outcome| {
                let _ = tx.send(outcome);
            },
            args,
        )?;
        rx.await.map_err(|_| PipeError::Abandoned)?
    }
}

impl Clone for Pipe {
    /// Copies the middleware list and the failure subscribers. Later changes
    /// to either pipe do not affect the other.
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            middleware: self.middleware.clone(),
            failures: Arc::new(self.failures.duplicate()),
            config: self.config.clone(),
        }
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("name", &self.config.name)
            .field("has_source", &self.has_source())
            .field("middleware", &self.middleware.len())
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{append_middleware, constant_source, counting_middleware};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_source_only() {
        let pipe = Pipe::with_source(constant_source(json!("You called me.")));
        assert_eq!(pipe.run(vec![]).await.unwrap(), json!("You called me."));
    }

    #[tokio::test]
    async fn test_middleware_transforms_value() {
        let mut pipe = Pipe::with_source(constant_source(json!("Hello")));
        pipe.use_middleware(append_middleware(" World"));

        assert_eq!(pipe.run(vec![]).await.unwrap(), json!("Hello World"));
    }

    #[tokio::test]
    async fn test_execute_without_source_fails_before_any_step() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipe = Pipe::new();
        pipe.use_middleware(counting_middleware(counter.clone()));

        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        let result = pipe.execute(move |_| { c.fetch_add(1, Ordering::SeqCst); }, vec![]);

        assert!(matches!(result, Err(PipeError::NoSource)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_execute_outside_runtime_fails() {
        let pipe = Pipe::with_source(constant_source(json!(1)));
        let result = pipe.execute(|_| {}, vec![]);
        assert!(matches!(result, Err(PipeError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_source_receives_arguments() {
        let pipe = Pipe::with_source(|args: &[Value], done: Completion| {
            let who = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("you must be a string"))?;
            done.complete(Ok(json!(format!("Hello {who}."))));
            Ok(())
        });

        assert_eq!(pipe.run(vec![json!("Bob")]).await.unwrap(), json!("Hello Bob."));

        let err = pipe.run(vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "you must be a string");
    }

    #[tokio::test]
    async fn test_source_panic_reaches_callback() {
        let pipe = Pipe::with_source(|_: &[Value], _: Completion| panic!("source bug"));
        let err = pipe.run(vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Step panicked: source bug");
    }

    #[tokio::test]
    async fn test_clear_and_replace_source() {
        let mut pipe = Pipe::with_source(constant_source(json!("first")));
        pipe.clear_source();
        assert!(!pipe.has_source());
        assert!(matches!(pipe.run(vec![]).await, Err(PipeError::NoSource)));

        pipe.source(constant_source(json!("second")));
        assert_eq!(pipe.run(vec![]).await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_clone_isolation() {
        let mut original = Pipe::with_source(constant_source(json!("You called me.")));
        let mut clone = original.clone();
        clone.use_middleware(|value: Value, next: Next| {
            next.advance(Ok(json!(format!("Observed: {}", value.as_str().unwrap_or_default()))));
            Ok(())
        });

        assert_eq!(original.middleware_len(), 0);
        assert_eq!(clone.middleware_len(), 1);
        assert_eq!(original.run(vec![]).await.unwrap(), json!("You called me."));
        assert_eq!(
            clone.run(vec![]).await.unwrap(),
            json!("Observed: You called me.")
        );

        original.use_middleware(append_middleware("!"));
        assert_eq!(clone.middleware_len(), 1);
    }

    #[tokio::test]
    async fn test_fork_replaces_source() {
        let mut pipe = Pipe::with_source(constant_source(json!("Somebody poked me!")));
        pipe.use_middleware(append_middleware(" (observed)"));

        let forked = pipe.fork(|args: &[Value], done: Completion| {
            let you = args.first().cloned().unwrap_or(Value::Null);
            done.complete(Ok(json!(format!("Hi {}", you.as_str().unwrap_or("you")))));
            Ok(())
        });

        assert_eq!(
            forked.run(vec![json!("tester")]).await.unwrap(),
            json!("Hi tester (observed)")
        );
        assert_eq!(
            pipe.run(vec![]).await.unwrap(),
            json!("Somebody poked me! (observed)")
        );
    }

    #[tokio::test]
    async fn test_clone_copies_subscribers() {
        let pipe = Pipe::with_source(constant_source(json!(1)));
        assert_eq!(pipe.subscriber_count(), 0);
        pipe.on_callback_failure(|_| {});

        let clone = pipe.clone();
        clone.on_callback_failure(|_| {});

        assert_eq!(pipe.subscriber_count(), 1);
        assert_eq!(clone.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipe = Pipe::with_source(constant_source(json!("Hello")))
            .with_config(PipeConfig::new().with_name("greeter").with_event_sink(sink.clone()));
        pipe.use_middleware(append_middleware(" World"));

        pipe.run(vec![]).await.unwrap();

        assert_eq!(
            sink.event_types(),
            vec!["pipe.execute.started".to_string(), "pipe.completed".to_string()]
        );
        let completed = &sink.events()[1];
        let data = completed.data.as_ref().unwrap();
        assert_eq!(data["pipe"], "greeter");
        assert_eq!(data["steps"], 1);
    }

    #[tokio::test]
    async fn test_debug_output() {
        let pipe = Pipe::new().with_name("debugged");
        let rendered = format!("{pipe:?}");
        assert!(rendered.contains("debugged"));
        assert!(rendered.contains("has_source: false"));
        assert_eq!(pipe.name(), "debugged");
    }
}
