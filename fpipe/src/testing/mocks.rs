//! Ready-made steps for tests and demos.

use crate::continuation::{Completion, Next};
use crate::functional::PipeArg;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A source that completes synchronously with `value`.
pub fn constant_source(
    value: Value,
) -> impl Fn(&[Value], Completion) -> anyhow::Result<()> + Send + Sync + 'static {
    move |_args: &[Value], done: Completion| {
        done.complete(Ok(value.clone()));
        Ok(())
    }
}

/// Middleware that appends `suffix` to a string value and advances.
pub fn append_middleware(
    suffix: &str,
) -> impl Fn(Value, Next) -> anyhow::Result<()> + Send + Sync + 'static {
    let suffix = suffix.to_string();
    move |value: Value, next: Next| {
        let text = value
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("expected a string, got {value}"))?;
        next.advance(Ok(Value::String(format!("{text}{suffix}"))));
        Ok(())
    }
}

/// Middleware that counts its invocations and advances unchanged.
pub fn counting_middleware(
    counter: Arc<AtomicUsize>,
) -> impl Fn(Value, Next) -> anyhow::Result<()> + Send + Sync + 'static {
    move |value: Value, next: Next| {
        counter.fetch_add(1, Ordering::SeqCst);
        next.advance(Ok(value));
        Ok(())
    }
}

/// Middleware that fails synchronously with `message`.
pub fn failing_middleware(
    message: &str,
) -> impl Fn(Value, Next) -> anyhow::Result<()> + Send + Sync + 'static {
    let message = message.to_string();
    move |_value: Value, _next: Next| Err(anyhow::anyhow!(message.clone()))
}

/// A step that adds `n` to its numeric argument.
pub fn add_step(n: i64) -> PipeArg {
    PipeArg::step(move |args| {
        let x = args
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("expected a number, got {args:?}"))?;
        Ok(Value::from(x + n))
    })
}

/// A step that counts its invocations and passes its first argument on.
pub fn counting_step(counter: Arc<AtomicUsize>) -> PipeArg {
    PipeArg::step(move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(args.into_iter().next().unwrap_or(Value::Null))
    })
}

/// A step that always fails with `message`.
pub fn failing_step(message: &str) -> PipeArg {
    let message = message.to_string();
    PipeArg::step(move |_args| Err(anyhow::anyhow!(message.clone())))
}

/// A step that records every argument list and returns a fixed output.
#[derive(Debug)]
pub struct RecordingStep {
    output: Mutex<Value>,
    calls: Mutex<Vec<Vec<Value>>>,
}

impl RecordingStep {
    /// Creates a recording step returning `output`.
    #[must_use]
    pub fn new(output: Value) -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(output),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Sets the output to return.
    pub fn set_output(&self, output: Value) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the step was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the argument lists of every call.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().clone()
    }

    /// Wraps this recorder as a pipeline step.
    #[must_use]
    pub fn as_step(self: &Arc<Self>) -> PipeArg {
        let recorder = Arc::clone(self);
        PipeArg::step(move |args| {
            recorder.calls.lock().push(args);
            Ok(recorder.output.lock().clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::FPipe;
    use serde_json::json;

    #[tokio::test]
    async fn test_recording_step() {
        let recorder = RecordingStep::new(json!("done"));
        let pipe = FPipe::new(vec![recorder.as_step()]).unwrap();

        assert_eq!(pipe.process(vec![json!(1), json!(2)]).await.unwrap(), json!("done"));
        recorder.set_output(json!("again"));
        assert_eq!(pipe.process(vec![]).await.unwrap(), json!("again"));

        assert_eq!(recorder.call_count(), 2);
        assert_eq!(recorder.recorded_calls(), vec![vec![json!(1), json!(2)], vec![]]);
    }

    #[tokio::test]
    async fn test_add_step_rejects_non_numbers() {
        let pipe = FPipe::new(vec![add_step(1)]).unwrap();
        assert!(pipe.process(vec![json!("x")]).await.is_err());
    }
}
