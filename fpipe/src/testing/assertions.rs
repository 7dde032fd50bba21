//! Test assertions for pipe outcomes.

use crate::errors::PipeError;
use serde_json::Value;

/// Asserts that the outcome resolved to `expected`.
pub fn assert_resolved(outcome: &Result<Value, PipeError>, expected: &Value) {
    match outcome {
        Ok(value) => assert_eq!(value, expected, "Unexpected resolved value"),
        Err(e) => panic!("Expected {expected}, got error: {e}"),
    }
}

/// Asserts that the outcome is a step failure with exactly `message`.
pub fn assert_step_failed(outcome: &Result<Value, PipeError>, message: &str) {
    match outcome {
        Ok(value) => panic!("Expected failure '{message}', got value: {value}"),
        Err(e) => {
            assert!(e.is_step_failure(), "Expected a step failure, got: {e:?}");
            assert_eq!(e.to_string(), message, "Unexpected failure message");
        }
    }
}
