//! Canned responses and body encoders.

use crate::request::encode_form;
use serde_json::Value;
use std::collections::HashMap;

/// Encodes response content into a body.
pub trait Encoder {
    /// Encode `data` (normally a map) into body bytes.
    fn encode(&self, data: &Value) -> Vec<u8>;

    /// Content type announced for the encoded body.
    fn content_type(&self) -> &'static str;
}

/// Url-encoded form encoding, the default for response content.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEncoder;

impl Encoder for FormEncoder {
    fn encode(&self, data: &Value) -> Vec<u8> {
        encode_form(data).into_bytes()
    }

    fn content_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }
}

/// JSON encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, data: &Value) -> Vec<u8> {
        data.to_string().into_bytes()
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// A response handed back to the intercepted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl MockResponse {
    /// An empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing any existing one with the same name
    /// regardless of case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Replace the body with `data` encoded by `encoder`, updating Content-Type.
    pub fn set_content(&mut self, data: &Value, encoder: &dyn Encoder) {
        self.body = encoder.encode(data);
        self.set_header("Content-Type", encoder.content_type());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
