//! # fpipe
//!
//! Composable value pipelines with two execution models:
//!
//! - **Continuation engine** ([`continuation::Pipe`]): a source produces a value,
//!   then an ordered list of middleware transforms it. Each middleware decides
//!   through its [`continuation::Next`] handle whether to advance or terminate.
//! - **Functional engine** ([`functional::FPipe`]): an immutable list of steps,
//!   any of which may compute its result asynchronously. Array results can be
//!   spread into the next step's positional arguments.
//!
//! Both engines report lifecycle events to an [`events::EventSink`] and log
//! through `tracing`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fpipe::prelude::*;
//! use serde_json::json;
//!
//! // Continuation style
//! let mut pipe = Pipe::with_source(|_args, done| {
//!     done.complete(Ok(json!("Hello")));
//!     Ok(())
//! });
//! pipe.use_middleware(|value, next| {
//!     next.advance(Ok(json!(format!("{} World", value.as_str().unwrap_or_default()))));
//!     Ok(())
//! });
//! assert_eq!(pipe.run(vec![]).await?, json!("Hello World"));
//!
//! // Functional style
//! let pipe = FPipe::new(vec![
//!     PipeArg::step(|args| Ok(json!([args[0].as_i64().unwrap_or(0) * 2, 5]))),
//!     true.into(),
//!     PipeArg::step(|args| Ok(json!(args.len()))),
//! ])?;
//! assert_eq!(pipe.process(vec![json!(1)]).await?, json!(2));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod continuation;
pub mod errors;
pub mod events;
pub mod functional;
pub mod observability;
pub mod testing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipeConfig;
    pub use crate::continuation::{CallbackFailure, Completion, Next, Pipe};
    pub use crate::errors::{PipeError, PipelineValidationError};
    pub use crate::events::{
        clear_event_sink, set_event_sink, CollectingEventSink, EventSink, LoggingEventSink,
        NoOpEventSink,
    };
    pub use crate::functional::{FPipe, PipeArg, Yield};
}
