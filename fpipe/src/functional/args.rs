//! Construction input for functional pipelines and its validation.

use super::step::{Step, StepFn, StepTuple, Yield};
use super::FPipe;
use crate::errors::{PipeError, PipelineValidationError};
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// One element of a construction or composition list.
///
/// A valid list is a sequence of steps, each optionally followed by a
/// boolean expand flag.
pub enum PipeArg {
    /// A step function.
    Step(StepFn),
    /// A nested pipeline.
    Pipe(FPipe),
    /// A nested list, which becomes a nested pipeline.
    Nested(Vec<PipeArg>),
    /// An expand flag for the preceding step.
    Flag(bool),
    /// Any other value. Never valid; kept so the error can name it.
    Value(Value),
}

impl PipeArg {
    /// A synchronous step.
    pub fn step<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Step(Arc::new(move |args| f(args).map(Yield::Ready)))
    }

    /// A step whose result is computed asynchronously.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Step(Arc::new(move |args| {
            Ok::<_, anyhow::Error>(Yield::pending(f(args)))
        }))
    }

    /// A step that builds its [`Yield`] itself.
    pub fn raw<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Yield> + Send + Sync + 'static,
    {
        Self::Step(Arc::new(f))
    }

    /// A nested pipeline.
    #[must_use]
    pub fn pipe(pipe: FPipe) -> Self {
        Self::Pipe(pipe)
    }

    /// A nested list.
    #[must_use]
    pub fn nested(args: Vec<Self>) -> Self {
        Self::Nested(args)
    }

    /// Renders the element for validation errors.
    fn describe(&self) -> String {
        match self {
            Self::Step(_) => "[step]".to_string(),
            Self::Pipe(_) => "[pipe]".to_string(),
            Self::Nested(args) => format!("[list of {}]", args.len()),
            Self::Flag(flag) => flag.to_string(),
            Self::Value(value) => value.to_string(),
        }
    }
}

impl From<bool> for PipeArg {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<Value> for PipeArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<FPipe> for PipeArg {
    fn from(pipe: FPipe) -> Self {
        Self::Pipe(pipe)
    }
}

impl From<Vec<PipeArg>> for PipeArg {
    fn from(args: Vec<PipeArg>) -> Self {
        Self::Nested(args)
    }
}

impl Debug for PipeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Converts a construction list into step tuples.
///
/// A flag directly after a step sets that step's expand flag. A flag
/// anywhere else, or a plain value, is rejected with its position.
pub(crate) fn make_tuples(args: Vec<PipeArg>) -> Result<Vec<StepTuple>, PipeError> {
    let mut tuples = Vec::with_capacity(args.len());
    let mut items = args.into_iter().enumerate().peekable();

    while let Some((position, arg)) = items.next() {
        let step = match arg {
            PipeArg::Step(func) => Step::Func(func),
            PipeArg::Pipe(pipe) => Step::Pipe(pipe),
            PipeArg::Nested(inner) => Step::Pipe(FPipe::over(inner)?),
            other @ (PipeArg::Flag(_) | PipeArg::Value(_)) => {
                return Err(PipelineValidationError::new(other.describe(), position).into());
            }
        };

        let expand = match items.peek() {
            Some((_, PipeArg::Flag(flag))) => {
                let flag = *flag;
                items.next();
                flag
            }
            _ => false,
        };

        tuples.push(StepTuple { step, expand });
    }

    Ok(tuples)
}
