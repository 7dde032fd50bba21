//! Testing utilities for pipes.
//!
//! This module provides:
//! - Ready-made sources, middleware and functional steps
//! - A recording step that remembers every argument list it received
//! - Assertions for pipe outcomes

mod assertions;
mod mocks;

pub use assertions::{assert_resolved, assert_step_failed};
pub use mocks::{
    add_step, append_middleware, constant_source, counting_middleware, counting_step,
    failing_middleware, failing_step, RecordingStep,
};
