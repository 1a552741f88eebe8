//! A single registered expectation.
//!
//! An [`Expectation`] couples the field matchers for a request with the
//! number of times it must be called and the response it answers with.
//! Builder methods return `&mut Self` so configuration can be chained off
//! the handle returned by registration.

use crate::error::ExpectationError;
use crate::fields::RequestExpectation;
use crate::matcher::Matcher;
use crate::request::MockRequest;
use crate::response::{Encoder, FormEncoder, JsonEncoder, MockResponse};
use serde_json::Value;
use std::fmt;

/// Stable handle to an expectation within its mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpectationId(pub(crate) usize);

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an expectation.
///
/// Transitions are by convention; builders are not prevented from running
/// after the first request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationState {
    /// No request has been offered yet.
    Configured,
    /// At least one request has been offered.
    Armed,
    /// The call quota is used up.
    Exhausted,
    /// `verify()` has run.
    Verified,
}

/// One expected request, its call-count contract, and its response.
#[derive(Debug, Clone)]
pub struct Expectation {
    id: ExpectationId,
    name: Option<String>,
    fields: RequestExpectation,
    expected_calls: usize,
    actual_calls: usize,
    attempted: bool,
    verified: bool,
    response: MockResponse,
}

impl Expectation {
    pub(crate) fn new(id: ExpectationId, seed: Option<&MockRequest>) -> Self {
        Self {
            id,
            name: None,
            fields: seed
                .map(RequestExpectation::seeded_from)
                .unwrap_or_default(),
            expected_calls: 1,
            actual_calls: 0,
            attempted: false,
            verified: false,
            response: MockResponse::default(),
        }
    }

    pub fn id(&self) -> ExpectationId {
        self.id
    }

    /// Label this expectation in diagnostics.
    pub fn named(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_url(&mut self, url: impl Into<Matcher>) -> &mut Self {
        self.fields.set_url(url.into());
        self
    }

    pub fn with_method(&mut self, method: impl Into<Matcher>) -> &mut Self {
        self.fields.set_method(method.into());
        self
    }

    pub fn with_query_params(&mut self, params: impl Into<Matcher>) -> &mut Self {
        self.fields.set_query(params.into());
        self
    }

    pub fn with_content_type(&mut self, content_type: impl Into<Matcher>) -> &mut Self {
        self.fields.set_content_type(content_type.into());
        self
    }

    pub fn with_json_content_type(&mut self) -> &mut Self {
        self.fields.set_json_content_type();
        self
    }

    pub fn with_body(&mut self, body: impl Into<Matcher>) -> &mut Self {
        self.fields.set_body(body.into());
        self
    }

    pub fn with_body_params(&mut self, params: impl Into<Matcher>) -> &mut Self {
        self.fields.set_body_params(params.into());
        self
    }

    /// Expect JSON body parameters and a JSON content type.
    pub fn with_json_body_params(&mut self, params: impl Into<Matcher>) -> &mut Self {
        self.with_json_content_type().with_body_params(params)
    }

    pub fn once(&mut self) -> &mut Self {
        self.times(1)
    }

    pub fn times(&mut self, expected_calls: usize) -> &mut Self {
        self.expected_calls = expected_calls;
        self
    }

    /// Answer with `response` as given.
    pub fn and_respond_with(&mut self, response: MockResponse) -> &mut Self {
        self.response = response;
        self
    }

    /// Answer with `data` encoded by `encoder` (a url-encoded form when
    /// `None`), overriding the status code when one is given.
    pub fn and_respond_with_content(
        &mut self,
        data: &Value,
        status: Option<u16>,
        encoder: Option<&dyn Encoder>,
    ) -> &mut Self {
        self.response.set_content(data, encoder.unwrap_or(&FormEncoder));
        if let Some(status) = status {
            self.response.status = status;
        }
        self
    }

    /// Answer with `data` as a url-encoded form body.
    pub fn and_respond_with_form(&mut self, data: &Value, status: Option<u16>) -> &mut Self {
        self.and_respond_with_content(data, status, Some(&FormEncoder))
    }

    /// Answer with `data` as a JSON body.
    pub fn and_respond_with_json(&mut self, data: &Value, status: Option<u16>) -> &mut Self {
        self.and_respond_with_content(data, status, Some(&JsonEncoder))
    }

    pub fn and_respond_with_code(&mut self, status: u16) -> &mut Self {
        self.response.status = status;
        self
    }

    pub fn fields(&self) -> &RequestExpectation {
        &self.fields
    }

    pub fn response(&self) -> &MockResponse {
        &self.response
    }

    pub fn expected_calls(&self) -> usize {
        self.expected_calls
    }

    pub fn actual_calls(&self) -> usize {
        self.actual_calls
    }

    pub fn state(&self) -> ExpectationState {
        if self.verified {
            ExpectationState::Verified
        } else if self.actual_calls >= self.expected_calls && self.attempted {
            ExpectationState::Exhausted
        } else if self.attempted {
            ExpectationState::Armed
        } else {
            ExpectationState::Configured
        }
    }

    /// Human-readable label: the configured name, or method and URL.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{} {}",
                self.fields.method().describe(),
                self.fields.url().describe()
            ),
        }
    }

    /// Offer `request` to this expectation.
    ///
    /// Returns the queued response and counts the call when every field
    /// matches and the quota allows it; otherwise returns every reason for
    /// declining.
    pub fn try_accept(
        &mut self,
        request: &MockRequest,
    ) -> Result<MockResponse, Vec<ExpectationError>> {
        self.attempted = true;

        let failures = self.fields.check(request);
        if !failures.is_empty() {
            return Err(failures);
        }

        if self.actual_calls >= self.expected_calls {
            return Err(vec![ExpectationError::InvalidCallCount {
                expectation: self.label(),
                actual: self.actual_calls + 1,
                expected: self.expected_calls,
            }]);
        }

        self.actual_calls += 1;
        Ok(self.response.clone())
    }

    /// Check that the expectation was called exactly as often as configured.
    pub fn verify(&mut self) -> Result<(), ExpectationError> {
        self.verified = true;
        if self.actual_calls != self.expected_calls {
            return Err(ExpectationError::InvalidCallCount {
                expectation: self.label(),
                actual: self.actual_calls,
                expected: self.expected_calls,
            });
        }
        Ok(())
    }
}
