//! HTTP Expectation Mock
//!
//! A test double for HTTP clients: register the requests a test expects,
//! arm canned responses for them, hand intercepted requests to the mock, and
//! verify afterwards that every expectation was met the declared number of
//! times.
//!
//! # Features
//!
//! - **Field Matching**: URL, method, query params, content type, and body
//! - **Literal or Custom**: Every field accepts a literal, a regex, or a predicate
//! - **Format-aware Bodies**: JSON and form bodies compare ignoring key order
//! - **Call Counts**: Expectations accept exactly `times(n)` requests
//! - **One Report**: All mismatches surface together from `verify()`
//!
//! # Routing
//!
//! Requests go to the first registered expectation that accepts them, not the
//! best one. Register specific expectations before general ones, or bound
//! general ones with `times(n)`.
//!
//! # Example
//!
//! ```
//! use http_expectation_mock::{HttpMock, Intercept, MockRequest};
//! use serde_json::json;
//!
//! let mut mock = HttpMock::new();
//! mock.should_receive_request()
//!     .with_method("PUT")
//!     .with_url("http://example.com/foo")
//!     .with_query_params(json!({"faz": "baz"}))
//!     .with_json_body_params(json!({"shakeyo": "body"}))
//!     .and_respond_with_json(&json!({"hello": "world"}), None);
//!
//! let request = MockRequest::put("http://example.com/foo?faz=baz")
//!     .with_json(&json!({"shakeyo": "body"}));
//! let response = mock.intercept(&request);
//!
//! assert_eq!(response.json().unwrap(), json!({"hello": "world"}));
//! mock.verify().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod expectation;
pub mod fields;
pub mod matcher;
pub mod mock;
pub mod request;
pub mod response;

pub use config::{MockConfig, MockSettings};
pub use error::ExpectationError;
pub use expectation::{Expectation, ExpectationId, ExpectationState};
pub use matcher::Matcher;
pub use mock::{HttpMock, Intercept};
pub use request::MockRequest;
pub use response::{Encoder, FormEncoder, JsonEncoder, MockResponse};
