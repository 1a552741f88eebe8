//! Error types for request expectations.
//!
//! Field-level failures are collected rather than raised, then folded into
//! [`ExpectationError::Unmatched`] at dispatch time or
//! [`ExpectationError::Compound`] at verification time.

use crate::matcher::pretty;
use serde_json::Value;
use thiserror::Error;

/// A reason a request was rejected by an expectation, or an expectation was
/// left unsatisfied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpectationError {
    /// A request field did not satisfy its matcher.
    #[error(
        "Request `{field}` does not match expected value. Actual: {}, Expected: {}",
        pretty(.actual),
        pretty(.expected)
    )]
    FieldMismatch {
        field: String,
        actual: Value,
        expected: Value,
    },

    /// A required field was never configured.
    #[error("Missing expectation for `{field}`")]
    MissingExpectation { field: String },

    /// A custom predicate returned false.
    #[error("{description}")]
    PredicateFailed { field: String, description: String },

    /// A custom predicate could not be evaluated.
    #[error("Custom expectation for `{field}` raised an error: {message}")]
    Evaluation { field: String, message: String },

    /// An expectation received more or fewer requests than configured.
    #[error(
        "Request count for {expectation} does not match expected value. Actual: {actual}, Expected: {expected}"
    )]
    InvalidCallCount {
        expectation: String,
        actual: usize,
        expected: usize,
    },

    /// A request arrived while no expectation was registered.
    #[error("No mock exists for request to `{url}`")]
    NoMock { url: String },

    /// A request was rejected by every registered expectation. The message is
    /// every rejection reason in registration order.
    #[error("{}", join(.failures))]
    Unmatched {
        url: String,
        failures: Vec<ExpectationError>,
    },

    /// Everything left outstanding when the mock was verified.
    #[error("HTTP mock verification failed: {}", join(.0))]
    Compound(Vec<ExpectationError>),
}

impl ExpectationError {
    /// Build a field mismatch.
    pub fn mismatch(field: &str, actual: impl Into<Value>, expected: impl Into<Value>) -> Self {
        ExpectationError::FieldMismatch {
            field: field.to_string(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    /// The failures aggregated by a compound error; empty for single failures.
    pub fn failures(&self) -> &[ExpectationError] {
        match self {
            ExpectationError::Unmatched { failures, .. } => failures,
            ExpectationError::Compound(failures) => failures,
            _ => &[],
        }
    }

    /// Whether this error aggregates other failures.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            ExpectationError::Unmatched { .. } | ExpectationError::Compound(_)
        )
    }

    /// The request field this failure concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ExpectationError::FieldMismatch { field, .. }
            | ExpectationError::MissingExpectation { field }
            | ExpectationError::PredicateFailed { field, .. }
            | ExpectationError::Evaluation { field, .. } => Some(field),
            _ => None,
        }
    }
}

fn join(failures: &[ExpectationError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_mismatch_message() {
        let err = ExpectationError::mismatch(
            "body (json)",
            json!({"shakeyo": "nope"}),
            json!({"shakeyo": "body"}),
        );
        assert_eq!(
            err.to_string(),
            "Request `body (json)` does not match expected value. Actual: {shakeyo: nope}, Expected: {shakeyo: body}"
        );
        assert_eq!(err.field(), Some("body (json)"));
    }

    #[test]
    fn test_compound_message_joins_failures() {
        let err = ExpectationError::Compound(vec![
            ExpectationError::NoMock {
                url: "http://x/foo".to_string(),
            },
            ExpectationError::MissingExpectation {
                field: "url".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "HTTP mock verification failed: No mock exists for request to `http://x/foo`; Missing expectation for `url`"
        );
        assert!(err.is_compound());
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_unmatched_message_is_joined_reasons() {
        let err = ExpectationError::Unmatched {
            url: "http://x/b".to_string(),
            failures: vec![
                ExpectationError::mismatch("url", "http://x/b", "http://x/a"),
                ExpectationError::MissingExpectation {
                    field: "http method".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Request `url` does not match expected value. Actual: http://x/b, Expected: http://x/a; Missing expectation for `http method`"
        );
    }

    #[test]
    fn test_single_failure_has_no_children() {
        let err = ExpectationError::InvalidCallCount {
            expectation: "GET http://x/foo".to_string(),
            actual: 2,
            expected: 1,
        };
        assert!(!err.is_compound());
        assert!(err.failures().is_empty());
        assert!(err.to_string().contains("Actual: 2, Expected: 1"));
    }
}
