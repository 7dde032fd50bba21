//! The immutable, promise-aware pipeline.

use super::args::{make_tuples, PipeArg};
use super::step::StepTuple;
use crate::config::PipeConfig;
use crate::errors::PipeError;
use crate::observability::{ExecutionSummary, SpanTimer};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// An immutable sequence of `(step, expand)` tuples.
///
/// Composition with [`FPipe::pipe`] returns a new pipeline and leaves the
/// original untouched. Cloning shares the tuple sequence.
#[derive(Clone)]
pub struct FPipe {
    steps: Arc<[StepTuple]>,
    config: PipeConfig,
}

impl Default for FPipe {
    fn default() -> Self {
        Self {
            steps: Arc::from(Vec::new()),
            config: PipeConfig::default(),
        }
    }
}

impl FPipe {
    /// Builds a pipeline from a flat list of steps and flags.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::InvalidPipeline`] naming the first element that
    /// is neither a step nor a flag directly after a step.
    pub fn new(args: Vec<PipeArg>) -> Result<Self, PipeError> {
        Ok(Self {
            steps: make_tuples(args)?.into(),
            config: PipeConfig::default(),
        })
    }

    /// Builds a pipeline over a nested list.
    ///
    /// # Errors
    ///
    /// Same as [`FPipe::new`].
    pub fn over(args: Vec<PipeArg>) -> Result<Self, PipeError> {
        Ok(Self::new(args)?.with_name("nested"))
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

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the expand flag of every step, in order.
    #[must_use]
    pub fn expand_flags(&self) -> Vec<bool> {
        self.steps.iter().map(|t| t.expand).collect()
    }

    /// Returns a new pipeline with `args` appended.
    ///
    /// # Errors
    ///
    /// Same as [`FPipe::new`]; `self` is unaffected either way.
    pub fn pipe(&self, args: Vec<PipeArg>) -> Result<Self, PipeError> {
        let mut steps = self.steps.to_vec();
        steps.extend(make_tuples(args)?);
        Ok(Self {
            steps: steps.into(),
            config: self.config.clone(),
        })
    }

    /// Runs the pipeline with `args` as the first step's arguments.
    ///
    /// Each step's result is awaited before the next step starts. If the
    /// previous tuple's expand flag is set and its result is an array, the
    /// elements become the next step's arguments; otherwise the result is
    /// the single argument. An empty pipeline resolves to `Value::Null`.
    ///
    /// The first failing step ends the run with its error.
    pub fn process(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value, PipeError>> {
        let steps = Arc::clone(&self.steps);
        let name = self.config.name.clone();
        let sink = self.config.resolve_sink();

        async move {
            let timer = SpanTimer::start(name.as_str());
            debug!(pipe = %name, steps = steps.len(), "Processing pipeline");
            sink.emit(
                "fpipe.process.started",
                Some(ExecutionSummary::new(name.as_str(), steps.len()).to_event_data()),
            )
            .await;

            let outcome = run_steps(&steps, args).await;

            let summary =
                ExecutionSummary::new(name.as_str(), steps.len()).with_duration_ms(timer.elapsed_ms());
            match &outcome {
                Ok(_) => {
                    debug!(pipe = %name, duration_ms = summary.duration_ms, "Pipeline processed");
                    sink.emit("fpipe.process.completed", Some(summary.to_event_data()))
                        .await;
                }
                Err(e) => {
                    warn!(pipe = %name, error = %e, "Pipeline failed");
                    sink.emit(
                        "fpipe.process.failed",
                        Some(summary.with_error(e.to_string()).to_event_data()),
                    )
                    .await;
                }
            }
            outcome
        }
        .boxed()
    }
}

async fn run_steps(steps: &[StepTuple], args: Vec<Value>) -> Result<Value, PipeError> {
    let Some((first, rest)) = steps.split_first() else {
        return Ok(Value::Null);
    };

    let mut result = first.step.invoke(args).await?;
    let mut expand = first.expand;

    for tuple in rest {
        let args = match result {
            Value::Array(items) if expand => items,
            single => vec![single],
        };
        result = tuple.step.invoke(args).await?;
        expand = tuple.expand;
    }

    Ok(result)
}

impl std::fmt::Debug for FPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FPipe")
            .field("name", &self.config.name)
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{add_step, assert_resolved, assert_step_failed, failing_step};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_pipeline_resolves_to_null() {
        let pipe = FPipe::default();
        assert!(pipe.is_empty());
        assert_resolved(&pipe.process(vec![]).await, &Value::Null);
    }

    #[tokio::test]
    async fn test_pipe_with_no_arguments_is_a_new_pipe() {
        let pipe = FPipe::default();
        let other = pipe.pipe(vec![]).unwrap();
        assert!(other.is_empty());
        assert_resolved(&other.process(vec![json!(1)]).await, &Value::Null);
    }

    #[tokio::test]
    async fn test_single_step_receives_no_arguments() {
        let pipe = FPipe::default()
            .pipe(vec![PipeArg::step(|args| {
                Ok(json!(format!("arguments[0]: {}", args.first().unwrap_or(&Value::Null))))
            })])
            .unwrap();

        assert_resolved(&pipe.process(vec![]).await, &json!("arguments[0]: null"));
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let pipe = FPipe::default().pipe(vec![add_step(1), add_step(1)]).unwrap();
        assert_resolved(&pipe.process(vec![json!(0)]).await, &json!(2));
    }

    #[tokio::test]
    async fn test_initial_arguments_are_spread() {
        let pipe = FPipe::new(vec![
            PipeArg::step(|args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(json!(sum))
            }),
            add_step(1),
        ])
        .unwrap();

        assert_resolved(&pipe.process(vec![json!(3), json!(4)]).await, &json!(8));
    }

    #[tokio::test]
    async fn test_expand_flag_spreads_array() {
        let pipe = FPipe::default()
            .pipe(vec![
                PipeArg::step(|args| {
                    let x = args[0].as_i64().unwrap_or_default();
                    let y = args[1].as_i64().unwrap_or_default();
                    Ok(json!([x * 2, y * 5]))
                }),
                true.into(),
                PipeArg::step(|args| {
                    assert_eq!(args.len(), 2);
                    let x = args[0].as_i64().unwrap_or_default();
                    let y = args[1].as_i64().unwrap_or_default();
                    Ok(json!(x + y))
                }),
            ])
            .unwrap();

        assert_resolved(&pipe.process(vec![json!(5), json!(2)]).await, &json!(20));
    }

    #[tokio::test]
    async fn test_array_without_flag_is_single_argument() {
        let pipe = FPipe::new(vec![
            PipeArg::step(|_| Ok(json!([1, 2, 3]))),
            PipeArg::step(|args| Ok(json!(args.len()))),
        ])
        .unwrap();

        assert_resolved(&pipe.process(vec![]).await, &json!(1));
    }

    #[tokio::test]
    async fn test_flag_on_non_array_result_passes_single_value() {
        let pipe = FPipe::new(vec![
            PipeArg::step(|_| Ok(json!("scalar"))),
            true.into(),
            PipeArg::step(|args| Ok(json!(args))),
        ])
        .unwrap();

        assert_resolved(&pipe.process(vec![]).await, &json!(["scalar"]));
    }

    #[tokio::test]
    async fn test_composition_does_not_mutate_original() {
        let base = FPipe::new(vec![add_step(1)]).unwrap();
        let extended = base.pipe(vec![add_step(10)]).unwrap();

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_resolved(&base.process(vec![json!(0)]).await, &json!(1));
        assert_resolved(&extended.process(vec![json!(0)]).await, &json!(11));
        assert_resolved(&base.process(vec![json!(0)]).await, &json!(1));
    }

    #[tokio::test]
    async fn test_invalid_composition_leaves_original_usable() {
        let base = FPipe::new(vec![add_step(1)]).unwrap();
        assert!(matches!(
            base.pipe(vec![json!("nope").into()]),
            Err(PipeError::InvalidPipeline(_))
        ));
        assert_resolved(&base.process(vec![json!(1)]).await, &json!(2));
    }

    #[tokio::test]
    async fn test_failure_message_preserved() {
        let pipe = FPipe::new(vec![add_step(1), failing_step("Boom!")]).unwrap();
        assert_step_failed(&pipe.process(vec![json!(0)]).await, "Boom!");
    }

    #[tokio::test]
    async fn test_expand_flags_reported() {
        let pipe = FPipe::new(vec![add_step(1), true.into(), add_step(1), add_step(2), false.into()])
            .unwrap();
        assert_eq!(pipe.expand_flags(), vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipe = FPipe::new(vec![add_step(1)])
            .unwrap()
            .with_config(PipeConfig::new().with_name("adder").with_event_sink(sink.clone()));

        pipe.process(vec![json!(1)]).await.unwrap();
        let failing = pipe.pipe(vec![failing_step("nope")]).unwrap();
        failing.process(vec![json!(1)]).await.unwrap_err();

        assert_eq!(
            sink.event_types(),
            vec![
                "fpipe.process.started".to_string(),
                "fpipe.process.completed".to_string(),
                "fpipe.process.started".to_string(),
                "fpipe.process.failed".to_string(),
            ]
        );
        let failed = &sink.events()[3];
        assert!(failed.is_failure());
        assert_eq!(failed.data.as_ref().unwrap()["error"], "nope");
        assert_eq!(failing.name(), "adder");
    }

    #[test]
    fn test_process_from_sync_context() {
        let pipe = FPipe::new(vec![add_step(41)]).unwrap();
        let value = tokio_test::block_on(pipe.process(vec![json!(1)])).unwrap();
        assert_eq!(value, json!(42));
    }
}
