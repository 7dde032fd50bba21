//! Steps of a functional pipeline and the values they yield.

use super::FPipe;
use crate::errors::PipeError;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A step function: receives the positional arguments, yields a value.
pub type StepFn = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Yield> + Send + Sync>;

/// What a step produces: a value now, or a value later.
///
/// A pending value may itself resolve to another pending value; the engine
/// keeps awaiting until it reaches a ready one.
pub enum Yield {
    /// The value is available.
    Ready(Value),
    /// The value is still being computed.
    Pending(BoxFuture<'static, anyhow::Result<Yield>>),
}

impl Yield {
    /// Wraps a future resolving to a plain value.
    pub fn pending<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Pending(future.map(|r| r.map(Self::Ready)).boxed())
    }

    /// Returns true if the value is not yet available.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Awaits until the value is available.
    ///
    /// # Errors
    ///
    /// Returns the rejection of any pending value in the chain, or
    /// [`PipeError::Panicked`] if one of them panicked while being polled.
    pub async fn settle(self) -> Result<Value, PipeError> {
        let mut current = self;
        loop {
            match current {
                Self::Ready(value) => return Ok(value),
                Self::Pending(future) => {
                    current = AssertUnwindSafe(future)
                        .catch_unwind()
                        .await
                        .map_err(|payload| PipeError::from_panic(payload.as_ref()))??;
                }
            }
        }
    }
}

impl From<Value> for Yield {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl Debug for Yield {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A unit of work in a functional pipeline.
#[derive(Clone)]
pub enum Step {
    /// A plain step function.
    Func(StepFn),
    /// A nested pipeline, run through its own `process`.
    Pipe(FPipe),
}

impl Step {
    /// Runs the step with `args` and awaits its result.
    pub(crate) fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value, PipeError>> {
        match self {
            Self::Pipe(pipe) => pipe.process(args),
            Self::Func(func) => {
                let produced = match catch_unwind(AssertUnwindSafe(|| func(args))) {
                    Ok(Ok(produced)) => produced,
                    Ok(Err(e)) => return futures::future::ready(Err(PipeError::Step(e))).boxed(),
                    Err(payload) => {
                        return futures::future::ready(Err(PipeError::from_panic(payload.as_ref())))
                            .boxed()
                    }
                };
                produced.settle().boxed()
            }
        }
    }
}

impl Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Func"),
            Self::Pipe(pipe) => f.debug_tuple("Pipe").field(pipe).finish(),
        }
    }
}

/// A step paired with its expand flag.
///
/// When `expand` is set and the step resolves to an array, the next step
/// receives the array's elements as separate arguments.
#[derive(Debug, Clone)]
pub struct StepTuple {
    /// The step.
    pub step: Step,
    /// Whether an array result is spread into the next step's arguments.
    pub expand: bool,
}
