//! Per-field request expectations.
//!
//! A [`RequestExpectation`] holds one matcher for each observable facet of a
//! request and checks all of them, collecting every failure.

use crate::error::ExpectationError;
use crate::matcher::Matcher;
use crate::request::{parse_query_string, strip_query, MockRequest};
use regex::Regex;
use serde_json::{Map, Value};

/// Field labels used in failure reports.
pub const URL: &str = "url";
pub const METHOD: &str = "http method";
pub const QUERY: &str = "query params";
pub const CONTENT_TYPE: &str = "content type";
pub const BODY: &str = "body";
pub const BODY_JSON: &str = "body (json)";
pub const BODY_FIELDS: &str = "body (fields)";

const JSON_PATTERN: &str = "^application/json";
const VALID_JSON_MARKER: &str = "is valid JSON";

/// How the request body is checked.
#[derive(Debug, Clone)]
pub enum BodyExpectation {
    /// Expected body text, compared with awareness of JSON and form encodings.
    Content(String),
    /// Matcher applied to the raw body text.
    Raw(Matcher),
    /// Matcher applied to the decoded JSON or form parameters.
    Params(Matcher),
}

/// The set of field matchers for one expectation.
#[derive(Debug, Clone)]
pub struct RequestExpectation {
    pub(crate) url: Matcher,
    pub(crate) method: Matcher,
    pub(crate) query: Matcher,
    pub(crate) content_type: Matcher,
    pub(crate) body: BodyExpectation,
    /// Whether the content-type expectation declares JSON
    pub(crate) json: bool,
}

impl Default for RequestExpectation {
    fn default() -> Self {
        Self {
            url: Matcher::Unset,
            method: Matcher::Unset,
            query: Matcher::StructuralEquals(Value::Object(Map::new())),
            content_type: Matcher::Any,
            body: BodyExpectation::Content(String::new()),
            json: false,
        }
    }
}

impl RequestExpectation {
    /// Expect exactly the fields of `request`.
    pub fn seeded_from(request: &MockRequest) -> Self {
        let mut fields = Self::default();
        fields.set_url(Matcher::from(request.url.as_str()));
        fields.set_method(Matcher::from(request.method.as_str()));
        fields.set_query(Matcher::StructuralEquals(request.query_params()));
        fields.set_body(Matcher::from(request.body.as_str()));
        if request.is_json() {
            fields.set_json_content_type();
        }
        fields
    }

    /// Expect the URL, ignoring any query string on literal values.
    pub fn set_url(&mut self, matcher: Matcher) {
        self.url = match matcher {
            Matcher::Equals(Value::String(url)) => {
                Matcher::Equals(Value::String(strip_query(&url).to_string()))
            }
            other => other,
        };
    }

    pub fn set_method(&mut self, matcher: Matcher) {
        self.method = matcher;
    }

    /// Expect the query parameters; literal maps compare structurally.
    pub fn set_query(&mut self, matcher: Matcher) {
        self.query = matcher.into_structural();
    }

    /// Expect the Content-Type header; literal values match anywhere in it.
    pub fn set_content_type(&mut self, matcher: Matcher) {
        self.content_type = match matcher {
            Matcher::Equals(Value::String(content_type)) => {
                self.json = content_type.starts_with("application/json");
                match Regex::new(&regex::escape(&content_type)) {
                    Ok(regex) => Matcher::RegexMatches(regex),
                    Err(_) => Matcher::Equals(Value::String(content_type)),
                }
            }
            other => {
                self.json = false;
                other
            }
        };
    }

    pub fn set_json_content_type(&mut self) {
        self.content_type = match Regex::new(JSON_PATTERN) {
            Ok(regex) => Matcher::RegexMatches(regex),
            Err(_) => Matcher::Any,
        };
        self.json = true;
    }

    /// Expect the body; literal text compares format-aware, other matchers
    /// see the raw text.
    pub fn set_body(&mut self, matcher: Matcher) {
        self.body = match matcher {
            Matcher::Equals(Value::String(content)) => BodyExpectation::Content(content),
            other => BodyExpectation::Raw(other),
        };
    }

    /// Expect decoded body parameters; literal maps compare structurally.
    pub fn set_body_params(&mut self, matcher: Matcher) {
        self.body = BodyExpectation::Params(matcher.into_structural());
    }

    pub fn url(&self) -> &Matcher {
        &self.url
    }

    pub fn method(&self) -> &Matcher {
        &self.method
    }

    pub fn body(&self) -> &BodyExpectation {
        &self.body
    }

    /// Check every field of `request`, returning all failures.
    pub fn check(&self, request: &MockRequest) -> Vec<ExpectationError> {
        let content_type = request
            .content_type()
            .map(|ct| Value::String(ct.to_string()))
            .unwrap_or(Value::Null);

        let results = [
            self.url
                .evaluate(URL, &Value::String(request.url_without_query().to_string())),
            self.method
                .evaluate(METHOD, &Value::String(request.method.clone())),
            self.query.evaluate(QUERY, &request.query_params()),
            self.content_type.evaluate(CONTENT_TYPE, &content_type),
            self.check_body(request),
        ];

        results.into_iter().filter_map(Result::err).collect()
    }

    fn check_body(&self, request: &MockRequest) -> Result<(), ExpectationError> {
        let json = self.json || request.is_json();
        match &self.body {
            BodyExpectation::Content(expected) => check_content(request, expected, json),
            BodyExpectation::Raw(matcher) => {
                matcher.evaluate(BODY, &Value::String(request.body.clone()))
            }
            BodyExpectation::Params(matcher) => {
                if json {
                    let actual = decode_json(&request.body)?;
                    matcher.evaluate(BODY_JSON, &actual)
                } else {
                    matcher.evaluate(BODY_FIELDS, &request.body_fields())
                }
            }
        }
    }
}

fn check_content(
    request: &MockRequest,
    expected: &str,
    json: bool,
) -> Result<(), ExpectationError> {
    let actual = request.body.as_str();

    if actual.is_empty() || expected.is_empty() {
        return Matcher::equals(expected).evaluate(BODY, &Value::String(actual.to_string()));
    }

    if json {
        let actual = decode_json(actual)?;
        let expected = decode_json(expected)?;
        Matcher::StructuralEquals(expected).evaluate(BODY_JSON, &actual)
    } else {
        Matcher::StructuralEquals(Value::Object(parse_query_string(expected)))
            .evaluate(BODY_FIELDS, &Value::Object(parse_query_string(actual)))
    }
}

fn decode_json(body: &str) -> Result<Value, ExpectationError> {
    serde_json::from_str(body)
        .map_err(|_| ExpectationError::mismatch(BODY_JSON, body, VALID_JSON_MARKER))
}
