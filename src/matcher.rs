//! Field matchers.
//!
//! A [`Matcher`] compares one projected request field against an expectation
//! and reports a structured [`ExpectationError`] when it does not hold.

use crate::error::ExpectationError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Error a fallible custom predicate may return.
pub type PredicateError = Box<dyn std::error::Error + Send + Sync>;

type PredicateFn = dyn Fn(&Value) -> Result<bool, PredicateError> + Send + Sync;

/// Failure message for custom predicates without a description.
pub const DEFAULT_PREDICATE_DESCRIPTION: &str = "Failed to verify custom expectation.";

/// Expected marker reported when a map was required.
const MAP_MARKER: &str = "[map]";

/// Expectation over a single request field.
///
/// Matchers are immutable once built and cheap to clone.
#[derive(Clone)]
pub enum Matcher {
    /// Strict equality of type and value.
    Equals(Value),
    /// Map equality independent of key order.
    StructuralEquals(Value),
    /// The actual map restricted to the expected keys equals the expected map.
    ContainsSubset(Value),
    /// The actual value, as text, matches the pattern.
    RegexMatches(Regex),
    /// The predicate returns true.
    CustomPredicate {
        predicate: Arc<PredicateFn>,
        description: String,
    },
    /// No expectation was configured; rejects everything.
    Unset,
    /// Accepts everything.
    Any,
}

impl Matcher {
    /// Strict equality with `expected`.
    pub fn equals(expected: impl Into<Value>) -> Self {
        Matcher::Equals(expected.into())
    }

    /// Key-order independent equality with the map `expected`.
    pub fn structural_equals(expected: impl Into<Value>) -> Self {
        Matcher::StructuralEquals(expected.into())
    }

    /// Partial containment of the map `expected`.
    pub fn contains_subset(expected: impl Into<Value>) -> Self {
        Matcher::ContainsSubset(expected.into())
    }

    /// Match the textual value against a regular expression.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Matcher::RegexMatches(Regex::new(pattern)?))
    }

    /// Accept values for which `predicate` returns true.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Matcher::CustomPredicate {
            predicate: Arc::new(move |value: &Value| Ok::<bool, PredicateError>(predicate(value))),
            description: DEFAULT_PREDICATE_DESCRIPTION.to_string(),
        }
    }

    /// Accept values for which a fallible `predicate` returns `Ok(true)`.
    ///
    /// An `Err` is reported as [`ExpectationError::Evaluation`] rather than a
    /// mismatch.
    pub fn try_predicate<F, E>(predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, E> + Send + Sync + 'static,
        E: Into<PredicateError>,
    {
        Matcher::CustomPredicate {
            predicate: Arc::new(move |value: &Value| {
                predicate(value).map_err(|e| -> PredicateError { e.into() })
            }),
            description: DEFAULT_PREDICATE_DESCRIPTION.to_string(),
        }
    }

    /// Replace the failure message of a custom predicate.
    ///
    /// Other matchers are returned unchanged.
    pub fn with_description(self, description: impl Into<String>) -> Self {
        match self {
            Matcher::CustomPredicate { predicate, .. } => Matcher::CustomPredicate {
                predicate,
                description: description.into(),
            },
            other => other,
        }
    }

    /// Evaluate the matcher against `actual`, reporting failures under `field`.
    pub fn evaluate(&self, field: &str, actual: &Value) -> Result<(), ExpectationError> {
        match self {
            Matcher::Equals(expected) => {
                if actual == expected {
                    Ok(())
                } else {
                    Err(ExpectationError::mismatch(field, actual.clone(), expected.clone()))
                }
            }
            Matcher::StructuralEquals(expected) => match (actual, expected) {
                (Value::Object(a), Value::Object(e)) => {
                    if maps_equal(a, e) {
                        Ok(())
                    } else {
                        Err(ExpectationError::mismatch(field, actual.clone(), expected.clone()))
                    }
                }
                _ => Err(ExpectationError::mismatch(field, actual.clone(), MAP_MARKER)),
            },
            Matcher::ContainsSubset(expected) => match (actual, expected) {
                (Value::Object(a), Value::Object(e)) => {
                    let projected: Map<String, Value> = a
                        .iter()
                        .filter(|(key, _)| e.contains_key(key.as_str()))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    Matcher::StructuralEquals(expected.clone())
                        .evaluate(field, &Value::Object(projected))
                }
                _ => Err(ExpectationError::mismatch(field, actual.clone(), MAP_MARKER)),
            },
            Matcher::RegexMatches(regex) => {
                if regex.is_match(&as_text(actual)) {
                    Ok(())
                } else {
                    Err(ExpectationError::mismatch(field, actual.clone(), regex.as_str()))
                }
            }
            Matcher::CustomPredicate {
                predicate,
                description,
            } => match predicate(actual) {
                Ok(true) => Ok(()),
                Ok(false) => Err(ExpectationError::PredicateFailed {
                    field: field.to_string(),
                    description: description.clone(),
                }),
                Err(e) => Err(ExpectationError::Evaluation {
                    field: field.to_string(),
                    message: e.to_string(),
                }),
            },
            Matcher::Unset => Err(ExpectationError::MissingExpectation {
                field: field.to_string(),
            }),
            Matcher::Any => Ok(()),
        }
    }

    /// Short human-readable form used to label expectations.
    pub fn describe(&self) -> String {
        match self {
            Matcher::Equals(v) | Matcher::StructuralEquals(v) => pretty(v),
            Matcher::ContainsSubset(v) => format!("{} (subset)", pretty(v)),
            Matcher::RegexMatches(regex) => format!("/{}/", regex.as_str()),
            Matcher::CustomPredicate { .. } => "<custom>".to_string(),
            Matcher::Unset => "<unset>".to_string(),
            Matcher::Any => "*".to_string(),
        }
    }

    /// Promote a literal map to structural equality.
    pub(crate) fn into_structural(self) -> Self {
        match self {
            Matcher::Equals(v @ Value::Object(_)) => Matcher::StructuralEquals(v),
            other => other,
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Matcher::StructuralEquals(v) => f.debug_tuple("StructuralEquals").field(v).finish(),
            Matcher::ContainsSubset(v) => f.debug_tuple("ContainsSubset").field(v).finish(),
            Matcher::RegexMatches(r) => f.debug_tuple("RegexMatches").field(&r.as_str()).finish(),
            Matcher::CustomPredicate { description, .. } => f
                .debug_struct("CustomPredicate")
                .field("description", description)
                .finish_non_exhaustive(),
            Matcher::Unset => f.write_str("Unset"),
            Matcher::Any => f.write_str("Any"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Matcher::Equals(Value::String(value.to_string()))
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Matcher::Equals(Value::String(value))
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Matcher::Equals(value)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::RegexMatches(regex)
    }
}

impl From<HashMap<String, String>> for Matcher {
    fn from(map: HashMap<String, String>) -> Self {
        Matcher::StructuralEquals(string_map(map))
    }
}

impl From<BTreeMap<String, String>> for Matcher {
    fn from(map: BTreeMap<String, String>) -> Self {
        Matcher::StructuralEquals(string_map(map))
    }
}

fn string_map(map: impl IntoIterator<Item = (String, String)>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

/// Key-order independent map comparison; nested maps recurse, list order is
/// significant.
fn maps_equal(actual: &Map<String, Value>, expected: &Map<String, Value>) -> bool {
    if actual.len() != expected.len() {
        return false;
    }

    let mut actual_keys: Vec<&String> = actual.keys().collect();
    let mut expected_keys: Vec<&String> = expected.keys().collect();
    actual_keys.sort();
    expected_keys.sort();
    if actual_keys != expected_keys {
        return false;
    }

    expected_keys
        .into_iter()
        .all(|key| match (actual.get(key), expected.get(key)) {
            (Some(a), Some(e)) => values_equal(a, e),
            _ => false,
        })
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => maps_equal(a, e),
        (Value::Array(a), Value::Array(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(x, y)| values_equal(x, y))
        }
        _ => actual == expected,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a value for diagnostics: strings bare, maps as `{key: value}`.
pub fn pretty(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(pretty).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", k, pretty(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}
