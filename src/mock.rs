//! The expectation registry and request dispatcher.
//!
//! Requests are offered to expectations in registration order and the first
//! one that accepts answers. This is first-match-wins, not best-match: an
//! earlier, looser expectation takes requests meant for a later, stricter
//! one. Register the most specific expectations first, or bound earlier ones
//! with [`Expectation::times`].

use crate::config::MockSettings;
use crate::error::ExpectationError;
use crate::expectation::{Expectation, ExpectationId};
use crate::request::MockRequest;
use crate::response::MockResponse;
use tracing::{debug, info, warn};

/// Hook a host client's transport calls before a request would be sent.
pub trait Intercept {
    /// Answer `request`. Must not fail; problems surface at verification.
    fn intercept(&mut self, request: &MockRequest) -> MockResponse;
}

impl<T: Intercept + ?Sized> Intercept for &mut T {
    fn intercept(&mut self, request: &MockRequest) -> MockResponse {
        (**self).intercept(request)
    }
}

/// Records expectations, answers intercepted requests, and verifies that
/// every expectation was met.
///
/// Each test should own a fresh `HttpMock`; nothing is shared between
/// instances.
#[derive(Debug, Default)]
pub struct HttpMock {
    expectations: Vec<Expectation>,
    /// Failures recorded while dispatching, surfaced by `verify()`
    deferred: Vec<ExpectationError>,
    settings: MockSettings,
}

impl HttpMock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Register an expectation with no fields configured.
    ///
    /// The URL and method must be set before it can match anything.
    pub fn should_receive_request(&mut self) -> &mut Expectation {
        self.register(None)
    }

    /// Register an expectation for requests equal to `seed`.
    pub fn should_receive(&mut self, seed: &MockRequest) -> &mut Expectation {
        self.register(Some(seed))
    }

    fn register(&mut self, seed: Option<&MockRequest>) -> &mut Expectation {
        let id = ExpectationId(self.expectations.len());
        debug!(expectation = %id, seeded = seed.is_some(), "Registering expectation");
        self.expectations.push(Expectation::new(id, seed));
        let last = self.expectations.len() - 1;
        &mut self.expectations[last]
    }

    pub fn expectation(&self, id: ExpectationId) -> Option<&Expectation> {
        self.expectations.get(id.0)
    }

    pub fn expectation_mut(&mut self, id: ExpectationId) -> Option<&mut Expectation> {
        self.expectations.get_mut(id.0)
    }

    /// Registered expectations, in registration order.
    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    /// Failures recorded while dispatching so far.
    pub fn deferred_failures(&self) -> &[ExpectationError] {
        &self.deferred
    }

    /// Route `request` to the first expectation that accepts it.
    ///
    /// Unlike [`Intercept::intercept`] this reports a miss to the caller and
    /// records nothing.
    pub fn dispatch(&mut self, request: &MockRequest) -> Result<MockResponse, ExpectationError> {
        if self.expectations.is_empty() {
            return Err(ExpectationError::NoMock {
                url: request.url.clone(),
            });
        }

        let mut failures = Vec::new();
        for expectation in &mut self.expectations {
            match expectation.try_accept(request) {
                Ok(response) => {
                    if self.settings.log_matches {
                        info!(
                            expectation = %expectation.id(),
                            method = %request.method,
                            url = %request.url,
                            calls = expectation.actual_calls(),
                            "Request matched expectation"
                        );
                    }
                    return Ok(response);
                }
                Err(reasons) => failures.extend(reasons),
            }
        }

        Err(ExpectationError::Unmatched {
            url: request.url.clone(),
            failures,
        })
    }

    /// Check everything outstanding: failures deferred while dispatching and
    /// every expectation's call count.
    pub fn verify(&mut self) -> Result<(), ExpectationError> {
        let mut failures = self.deferred.clone();
        for expectation in &mut self.expectations {
            if let Err(e) = expectation.verify() {
                failures.push(e);
            }
        }

        if failures.is_empty() {
            debug!(
                expectations = self.expectations.len(),
                "All expectations verified"
            );
            Ok(())
        } else {
            warn!(failures = failures.len(), "HTTP mock verification failed");
            Err(ExpectationError::Compound(failures))
        }
    }
}

impl Intercept for HttpMock {
    /// Answer `request`, recording any failure for `verify()` and returning
    /// an empty 200 so the client's own error handling does not obscure it.
    fn intercept(&mut self, request: &MockRequest) -> MockResponse {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(error) => {
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        reasons = %error,
                        "No expectation accepted request; deferring failure"
                    );
                }
                self.deferred.push(error);
                MockResponse::default()
            }
        }
    }
}
