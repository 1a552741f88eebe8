//! Expectation fixtures.
//!
//! Expectations can be declared in YAML and loaded into a fresh [`HttpMock`].
//! Definitions register in file order, so first-match-wins routing follows
//! the order they are written in.

use crate::expectation::Expectation;
use crate::matcher::Matcher;
use crate::mock::HttpMock;
use crate::response::MockResponse;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Main configuration for an expectation fixture.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Expectations, in registration order
    #[serde(default)]
    pub expectations: Vec<ExpectationDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: MockSettings,
}

impl MockConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut ids = HashSet::new();
        for (i, expectation) in self.expectations.iter().enumerate() {
            expectation
                .validate()
                .map_err(|e| anyhow::anyhow!("Expectation {}: {}", i, e))?;
            if !ids.insert(expectation.id.as_str()) {
                anyhow::bail!("Expectation {}: duplicate id '{}'", i, expectation.id);
            }
        }
        Ok(())
    }

    /// Build a fresh mock with every expectation registered.
    pub fn build_mock(&self) -> anyhow::Result<HttpMock> {
        let mut mock = HttpMock::with_settings(self.settings.clone());
        for expectation in &self.expectations {
            expectation.register(&mut mock)?;
        }
        Ok(mock)
    }
}

/// A single expectation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationDefinition {
    /// Unique identifier
    pub id: String,

    /// Label used in diagnostics (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Request expectations
    pub request: RequestDefinition,

    /// Number of times the request must be made
    #[serde(default = "default_times")]
    pub times: usize,

    /// Response to answer with
    #[serde(default)]
    pub response: ResponseDefinition,
}

fn default_times() -> usize {
    1
}

impl ExpectationDefinition {
    /// Validate the expectation definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.is_empty() {
            anyhow::bail!("Expectation id cannot be empty");
        }
        self.request.validate()?;
        self.response.validate()?;
        Ok(())
    }

    fn register(&self, mock: &mut HttpMock) -> anyhow::Result<()> {
        let response = self.response.to_response()?;
        let expectation = mock.should_receive_request();
        expectation
            .named(self.name.as_deref().unwrap_or(&self.id))
            .times(self.times)
            .and_respond_with(response);
        self.request.apply(expectation)
    }
}

/// Request matching configuration. Omitted `url` and `method` stay unset
/// and reject every request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// URL matching (query string ignored)
    #[serde(default)]
    pub url: Option<FieldMatcher>,

    /// HTTP method matching
    #[serde(default)]
    pub method: Option<FieldMatcher>,

    /// Query parameter matching (defaults to no parameters)
    #[serde(default)]
    pub query: Option<FieldMatcher>,

    /// Content-Type matching
    #[serde(default)]
    pub content_type: Option<FieldMatcher>,

    /// Require a JSON content type
    #[serde(default)]
    pub json: bool,

    /// Body matching (defaults to an empty body)
    #[serde(default)]
    pub body: Option<BodyDefinition>,
}

impl RequestDefinition {
    /// Validate the request definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        for matcher in [&self.url, &self.method, &self.query, &self.content_type]
            .into_iter()
            .flatten()
        {
            matcher.to_matcher()?;
        }
        if let Some(body) = &self.body {
            body.validate()?;
        }
        Ok(())
    }

    fn apply(&self, expectation: &mut Expectation) -> anyhow::Result<()> {
        if let Some(url) = &self.url {
            expectation.with_url(url.to_matcher()?);
        }
        if let Some(method) = &self.method {
            expectation.with_method(method.to_matcher()?);
        }
        if let Some(query) = &self.query {
            expectation.with_query_params(query.to_matcher()?);
        }
        if let Some(content_type) = &self.content_type {
            expectation.with_content_type(content_type.to_matcher()?);
        }
        if self.json {
            expectation.with_json_content_type();
        }
        if let Some(body) = &self.body {
            body.apply(expectation)?;
        }
        Ok(())
    }
}

/// Field matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldMatcher {
    /// Strict equality
    Equals { value: serde_json::Value },
    /// Map equality ignoring key order
    StructuralEquals { value: serde_json::Value },
    /// The listed keys must be present with these values
    ContainsSubset { value: serde_json::Value },
    /// Regex pattern match
    Regex { pattern: String },
    /// Anything matches
    Any,
}

impl FieldMatcher {
    /// Compile into a matcher.
    pub fn to_matcher(&self) -> anyhow::Result<Matcher> {
        Ok(match self {
            FieldMatcher::Equals { value } => Matcher::Equals(value.clone()),
            FieldMatcher::StructuralEquals { value } => {
                if !value.is_object() {
                    anyhow::bail!("structural_equals expects a map, got {}", value);
                }
                Matcher::StructuralEquals(value.clone())
            }
            FieldMatcher::ContainsSubset { value } => {
                if !value.is_object() {
                    anyhow::bail!("contains_subset expects a map, got {}", value);
                }
                Matcher::ContainsSubset(value.clone())
            }
            FieldMatcher::Regex { pattern } => Matcher::regex(pattern)
                .map_err(|e| anyhow::anyhow!("Invalid regex: {}", e))?,
            FieldMatcher::Any => Matcher::Any,
        })
    }
}

/// Body matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyDefinition {
    /// Expected body text; JSON and form bodies compare ignoring key order
    Content { content: String },
    /// Decoded body parameters (form fields, or JSON for JSON requests)
    Params { matcher: FieldMatcher },
    /// JSON body parameters; also requires a JSON content type
    JsonParams { matcher: FieldMatcher },
    /// Regex over the raw body text
    Regex { pattern: String },
}

impl BodyDefinition {
    /// Validate the body definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            BodyDefinition::Params { matcher } | BodyDefinition::JsonParams { matcher } => {
                matcher.to_matcher()?;
            }
            BodyDefinition::Regex { pattern } => {
                regex::Regex::new(pattern).map_err(|e| anyhow::anyhow!("Invalid regex: {}", e))?;
            }
            BodyDefinition::Content { .. } => {}
        }
        Ok(())
    }

    fn apply(&self, expectation: &mut Expectation) -> anyhow::Result<()> {
        match self {
            BodyDefinition::Content { content } => {
                expectation.with_body(content.as_str());
            }
            BodyDefinition::Params { matcher } => {
                expectation.with_body_params(matcher.to_matcher()?);
            }
            BodyDefinition::JsonParams { matcher } => {
                expectation.with_json_body_params(matcher.to_matcher()?);
            }
            BodyDefinition::Regex { pattern } => {
                expectation.with_body(
                    Matcher::regex(pattern).map_err(|e| anyhow::anyhow!("Invalid regex: {}", e))?,
                );
            }
        }
        Ok(())
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        if let Some(body @ ResponseBody::Base64 { .. }) = &self.body {
            body.to_bytes()?;
        }
        Ok(())
    }

    /// Build the response, with Content-Type derived from the body unless
    /// set explicitly.
    pub fn to_response(&self) -> anyhow::Result<MockResponse> {
        let mut response = MockResponse::new(self.status);

        if let Some(body) = &self.body {
            response.body = body.to_bytes()?;
            response.set_header("Content-Type", body.content_type());
        }

        for (name, value) in &self.headers {
            response.set_header(name.as_str(), value.as_str());
        }

        Ok(response)
    }
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Url-encoded form body
    Form { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
    /// Load from file
    File { path: String },
}

impl ResponseBody {
    /// Get the body content as bytes.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        use crate::response::{Encoder, FormEncoder, JsonEncoder};

        match self {
            ResponseBody::Text { content } => Ok(content.as_bytes().to_vec()),
            ResponseBody::Json { content } => Ok(JsonEncoder.encode(content)),
            ResponseBody::Form { content } => Ok(FormEncoder.encode(content)),
            ResponseBody::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))
            }
            ResponseBody::File { path } => std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path, e)),
        }
    }

    /// Get content type for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseBody::Text { .. } => "text/plain",
            ResponseBody::Json { .. } => "application/json",
            ResponseBody::Form { .. } => "application/x-www-form-urlencoded",
            ResponseBody::Base64 { .. } => "application/octet-stream",
            ResponseBody::File { .. } => "application/octet-stream",
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockSettings {
    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no expectation accepted
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::Intercept;
    use crate::request::MockRequest;
    use serde_json::json;
    use std::io::Write;

    const FIXTURE: &str = r#"
expectations:
  - id: list-users
    request:
      method:
        type: equals
        value: GET
      url:
        type: equals
        value: http://example.com/users
      query:
        type: contains_subset
        value:
          page: "1"
    times: 2
    response:
      status: 200
      body:
        type: json
        content:
          users: []

  - id: create-user
    request:
      method:
        type: equals
        value: POST
      url:
        type: regex
        pattern: "^http://example.com/users$"
      body:
        type: json_params
        matcher:
          type: equals
          value:
            name: John
    response:
      status: 201
      headers:
        Location: /users/1
"#;

    #[test]
    fn test_parse_fixture() {
        let config = MockConfig::from_yaml(FIXTURE).unwrap();
        assert_eq!(config.expectations.len(), 2);
        assert_eq!(config.expectations[0].id, "list-users");
        assert_eq!(config.expectations[0].times, 2);
        assert_eq!(config.expectations[1].times, 1);
        assert!(config.settings.log_matches);
    }

    #[test]
    fn test_build_mock_registers_in_order() {
        let config = MockConfig::from_yaml(FIXTURE).unwrap();
        let mut mock = config.build_mock().unwrap();
        assert_eq!(mock.expectations().len(), 2);
        assert_eq!(mock.expectations()[0].label(), "list-users");

        let list = MockRequest::get("http://example.com/users?page=1&sort=asc");
        assert_eq!(mock.intercept(&list).json().unwrap(), json!({"users": []}));
        mock.intercept(&list);

        let create = MockRequest::post("http://example.com/users").with_json(&json!({"name": "John"}));
        let response = mock.intercept(&create);
        assert_eq!(response.status, 201);
        assert_eq!(response.header("location"), Some("/users/1"));

        assert!(mock.verify().is_ok());
    }

    #[test]
    fn test_omitted_url_stays_unset() {
        let yaml = r#"
expectations:
  - id: method-only
    request:
      method:
        type: equals
        value: GET
"#;
        let mut mock = MockConfig::from_yaml(yaml).unwrap().build_mock().unwrap();
        mock.intercept(&MockRequest::get("http://x/foo"));
        let err = mock.verify().unwrap_err();
        assert!(err.to_string().contains("Missing expectation for `url`"));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let yaml = r#"
expectations:
  - id: bad
    request: {}
    priority: 10
"#;
        assert!(MockConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let yaml = r#"
expectations:
  - id: same
    request: {}
  - id: same
    request: {}
"#;
        let err = MockConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn test_rejects_invalid_regex() {
        let yaml = r#"
expectations:
  - id: bad-regex
    request:
      url:
        type: regex
        pattern: "("
"#;
        let err = MockConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid regex"));
    }

    #[test]
    fn test_rejects_invalid_status() {
        let yaml = r#"
expectations:
  - id: bad-status
    request: {}
    response:
      status: 42
"#;
        assert!(MockConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_response_body_to_bytes() {
        let text = ResponseBody::Text {
            content: "hello".to_string(),
        };
        assert_eq!(text.to_bytes().unwrap(), b"hello");

        let form = ResponseBody::Form {
            content: json!({"key": "value"}),
        };
        assert_eq!(form.to_bytes().unwrap(), b"key=value");

        let binary = ResponseBody::Base64 {
            content: "aGk=".to_string(),
        };
        assert_eq!(binary.to_bytes().unwrap(), b"hi");
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let definition = ResponseDefinition {
            status: 200,
            headers: [("content-type".to_string(), "application/vnd.api+json".to_string())]
                .into_iter()
                .collect(),
            body: Some(ResponseBody::Json {
                content: json!({"a": 1}),
            }),
        };
        let response = definition.to_response().unwrap();
        assert_eq!(response.headers.len(), 1);
        assert_eq!(
            response.header("Content-Type"),
            Some("application/vnd.api+json")
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let config = MockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.expectations.len(), 2);
    }
}
