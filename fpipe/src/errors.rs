//! Error types for the fpipe engines.
//!
//! Configuration and validation errors are returned synchronously by the call
//! that violates the contract. Step failures travel to the single completion
//! point of an execution and keep the step's own error intact.

use std::any::Any;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipe operations.
#[derive(Debug, Error)]
pub enum PipeError {
    /// `execute` was called on a pipe without a source.
    #[error("Invalid operation; the pipe doesn't have a source.")]
    NoSource,

    /// Execution was requested outside of a tokio runtime.
    #[error("Invalid operation; the pipe must be executed within a tokio runtime.")]
    NoRuntime,

    /// Every continuation of an execution was dropped before it completed.
    #[error("Pipe execution was abandoned before completing.")]
    Abandoned,

    /// A construction or composition list was malformed.
    #[error("{0}")]
    InvalidPipeline(#[from] PipelineValidationError),

    /// A step reported a failure.
    #[error(transparent)]
    Step(#[from] anyhow::Error),

    /// A step, source or middleware panicked.
    #[error("Step panicked: {message}")]
    Panicked {
        /// The panic payload rendered as text.
        message: String,
    },
}

impl PipeError {
    /// Builds a [`PipeError::Panicked`] from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panicked {
            message: panic_message(payload),
        }
    }

    /// Returns true if this error came from a step rather than from the
    /// pipe's configuration.
    #[must_use]
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::Step(_) | Self::Panicked { .. })
    }
}

/// Error raised when a step list is malformed.
///
/// Every element of a construction list must be a step, optionally followed
/// by a boolean expand flag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Invalid pipeline; array must contain processing steps, each optionally followed by a boolean. Received {received} in position {position}."
)]
pub struct PipelineValidationError {
    /// The offending element, rendered as text.
    pub received: String,
    /// Zero-based position of the offending element.
    pub position: usize,
}

impl PipelineValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(received: impl Into<String>, position: usize) -> Self {
        Self {
            received: received.into(),
            position,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("received".to_string(), serde_json::json!(self.received));
        map.insert("position".to_string(), serde_json::json!(self.position));
        map
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
