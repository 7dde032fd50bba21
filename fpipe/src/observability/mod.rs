//! Observability utilities.

mod tracing;

pub use tracing::{ExecutionSummary, SpanTimer};
