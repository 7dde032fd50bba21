//! Continuation-style engine.
//!
//! A [`Pipe`] owns a source and an ordered list of middleware. Executing it
//! calls the source, then walks the middleware one at a time, each deciding
//! through its [`Next`] handle whether to advance or to terminate early.
//!
//! - Failures short-circuit to the completion callback.
//! - Every continuation is deferred onto the tokio runtime.
//! - Panics in the completion callback go to a separate failure channel.

mod execution;
mod failure;
mod pipe;

pub use execution::{Completion, FinalCallback, Middleware, Next, Source};
pub use failure::{CallbackFailure, FailureChannel, FailureHandler};
pub use pipe::Pipe;
