//! End-to-end behaviour of the mock as a client test would drive it.

use http_expectation_mock::{
    ExpectationError, HttpMock, Intercept, Matcher, MockRequest, MockResponse,
};
use serde_json::{json, Value};

/// Minimal client whose transport is hooked by the mock.
struct Client<'a> {
    transport: &'a mut dyn Intercept,
}

impl<'a> Client<'a> {
    fn send(&mut self, request: MockRequest) -> MockResponse {
        self.transport.intercept(&request)
    }

    fn get(&mut self, url: &str) -> MockResponse {
        self.send(MockRequest::get(url))
    }
}

fn foo_mock() -> HttpMock {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("GET")
        .with_url("http://x/foo")
        .and_respond_with_json(&json!({"ok": true}), None);
    mock
}

#[test]
fn responds_once_and_verifies() {
    let mut mock = foo_mock();
    let response = Client { transport: &mut mock }.get("http://x/foo");

    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap(), json!({"ok": true}));
    assert!(mock.verify().is_ok());
}

#[test]
fn second_call_gets_stub_and_fails_verification() {
    let mut mock = foo_mock();
    {
        let mut client = Client { transport: &mut mock };
        client.get("http://x/foo");
        let stub = client.get("http://x/foo");
        assert_eq!(stub, MockResponse::default());
    }

    let err = mock.verify().unwrap_err();
    assert!(matches!(err, ExpectationError::Compound(_)));
    assert_eq!(
        err.failures(),
        &[ExpectationError::Unmatched {
            url: "http://x/foo".to_string(),
            failures: vec![ExpectationError::InvalidCallCount {
                expectation: "GET http://x/foo".to_string(),
                actual: 2,
                expected: 1,
            }],
        }]
    );
}

#[test]
fn never_called_expectation_fails_verification() {
    let mut mock = foo_mock();
    let err = mock.verify().unwrap_err();
    assert_eq!(
        err.failures(),
        &[ExpectationError::InvalidCallCount {
            expectation: "GET http://x/foo".to_string(),
            actual: 0,
            expected: 1,
        }]
    );
}

#[test]
fn quota_of_two() {
    for calls in [1usize, 2, 3] {
        let mut mock = HttpMock::new();
        mock.should_receive_request()
            .with_method("GET")
            .with_url("http://x/foo")
            .times(2);

        for _ in 0..calls {
            mock.intercept(&MockRequest::get("http://x/foo"));
        }

        assert_eq!(mock.expectations()[0].actual_calls(), calls.min(2));
        assert_eq!(mock.verify().is_ok(), calls == 2, "calls = {}", calls);
    }
}

#[test]
fn no_expectations_registered() {
    let mut mock = HttpMock::new();
    mock.intercept(&MockRequest::get("http://www.example.com/shazlooey").with_body("not=expected"));

    let err = mock.verify().unwrap_err();
    assert_eq!(
        err.failures(),
        &[ExpectationError::NoMock {
            url: "http://www.example.com/shazlooey".to_string()
        }]
    );
}

#[test]
fn json_body_params() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .times(2)
        .with_method("PUT")
        .with_url("http://x/foo")
        .with_json_body_params(json!({"shakeyo": "body"}));

    let good = MockRequest::put("http://x/foo").with_json(&json!({"shakeyo": "body"}));
    let bad = MockRequest::put("http://x/foo").with_json(&json!({"shakeyo": "nope"}));
    mock.intercept(&good);
    mock.intercept(&bad);

    let err = mock.verify().unwrap_err();
    let unmatched = &err.failures()[0];
    assert_eq!(
        unmatched.failures(),
        &[ExpectationError::FieldMismatch {
            field: "body (json)".to_string(),
            actual: json!({"shakeyo": "nope"}),
            expected: json!({"shakeyo": "body"}),
        }]
    );
    assert!(err
        .to_string()
        .contains("Actual: {shakeyo: nope}, Expected: {shakeyo: body}"));
}

#[test]
fn seeded_expectation_matches_equivalent_request() {
    let seed = MockRequest::put("http://example.com/foo?faz=baz")
        .with_json(&json!({"shakeyo": "body", "more": [1, 2]}));

    let mut mock = HttpMock::new();
    mock.should_receive(&seed)
        .and_respond_with(MockResponse::new(200).with_body(r#"{"hello":"world"}"#));

    let actual = MockRequest::put("http://example.com/foo?faz=baz")
        .with_header("content-type", "application/json")
        .with_body(r#"{"more": [1, 2], "shakeyo": "body"}"#);
    let response = mock.intercept(&actual);

    assert_eq!(response.body_text(), r#"{"hello":"world"}"#);
    assert!(mock.verify().is_ok());
}

#[test]
fn form_body_params_ignore_order_and_nulls() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("POST")
        .with_url("http://www.example.com/foo")
        .with_body_params(json!({"foo": "bar", "faz": "baz"}));

    let request = MockRequest::post("http://www.example.com/foo")
        .with_form(&json!({"faz": "baz", "nullA": null, "foo": "bar"}));
    mock.intercept(&request);

    assert!(mock.verify().is_ok());
}

#[test]
fn nested_form_body_matches_its_own_encoding() {
    let fields = json!({"ids": ["1", "2"], "a": {"b": "c"}});

    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("POST")
        .with_url("http://x/f")
        .with_body_params(fields.clone());

    mock.intercept(&MockRequest::post("http://x/f").with_form(&fields));

    assert!(mock.verify().is_ok());
}

#[test]
fn nested_form_query_params() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("GET")
        .with_url("http://x/search")
        .with_query_params(json!({"filter": {"tags": ["a", "b"]}}));

    mock.intercept(&MockRequest::get(
        "http://x/search?filter[tags][]=a&filter[tags][]=b",
    ));

    assert!(mock.verify().is_ok());
}

#[test]
fn custom_predicates_on_every_field() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_url(Matcher::predicate(|url| {
            url.as_str().map(|u| u.ends_with("/users")).unwrap_or(false)
        }))
        .with_method(Matcher::regex("^(GET|HEAD)$").unwrap())
        .with_query_params(Matcher::contains_subset(json!({"page": "2"})))
        .with_body(Matcher::Any)
        .and_respond_with_code(206);

    let response = mock.intercept(&MockRequest::new("HEAD", "http://api/v1/users?page=2&limit=5"));
    assert_eq!(response.status, 206);
    assert!(mock.verify().is_ok());
}

#[test]
fn predicate_failure_uses_description() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("GET")
        .with_url(Matcher::predicate(|_| false).with_description("url must be internal"));

    mock.intercept(&MockRequest::get("http://x/foo"));
    let err = mock.verify().unwrap_err();
    assert!(err.to_string().contains("url must be internal"));
}

#[test]
fn every_mismatch_is_reported() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("POST")
        .with_url("http://x/foo")
        .with_query_params(json!({"a": "1"}));

    mock.intercept(&MockRequest::get("http://x/bar?a=2"));
    mock.intercept(&MockRequest::post("http://x/foo?a=1"));

    let err = mock.verify().unwrap_err();
    let reasons: Vec<Option<&str>> = err.failures()[0]
        .failures()
        .iter()
        .map(ExpectationError::field)
        .collect();
    assert_eq!(
        reasons,
        vec![Some("url"), Some("http method"), Some("query params")]
    );
    assert_eq!(err.failures().len(), 1);
}

#[test]
fn respond_with_content_uses_encoder() {
    let mut mock = HttpMock::new();
    mock.should_receive_request()
        .with_method("GET")
        .with_url("http://x/form")
        .and_respond_with_form(&json!({"token": "abc def"}), None)
        .and_respond_with_code(234);

    let response = mock.intercept(&MockRequest::get("http://x/form"));
    assert_eq!(response.status, 234);
    assert_eq!(response.body_text(), "token=abc%20def");

    let parsed: Value = MockRequest::post("http://x")
        .with_body(response.body_text())
        .body_fields();
    assert_eq!(parsed, json!({"token": "abc def"}));
}
