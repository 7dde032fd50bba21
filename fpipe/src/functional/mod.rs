//! Promise-aware functional engine.
//!
//! An [`FPipe`] is an immutable list of steps, each with an expand flag.
//! Processing threads a value through the steps, awaiting every pending
//! [`Yield`], and spreads array results into positional arguments where the
//! preceding step's flag asks for it.

mod args;
mod pipe;
mod step;

pub use args::PipeArg;
pub use pipe::FPipe;
pub use step::{Step, StepFn, StepTuple, Yield};
