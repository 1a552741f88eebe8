//! Intercepted requests.
//!
//! [`MockRequest`] is what a host client's transport hook hands to the mock,
//! along with the projections expectations are checked against.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An outgoing HTTP request, as seen by the mock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockRequest {
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,

    /// Full URL, including any query string
    pub url: String,

    /// Request headers, one entry per case-insensitive name
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: HashMap<String, String>,

    /// Request body
    #[serde(default)]
    pub body: String,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Insert a header, replacing any existing entry whose name differs only in case.
fn insert_header(headers: &mut HashMap<String, String>, name: String, value: String) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

fn deserialize_headers<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HeadersVisitor;

    impl<'de> Visitor<'de> for HeadersVisitor {
        type Value = HashMap<String, String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to values")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut headers = HashMap::new();
            while let Some((name, value)) = access.next_entry::<String, String>()? {
                insert_header(&mut headers, name, value);
            }
            Ok(headers)
        }
    }

    deserializer.deserialize_map(HeadersVisitor)
}

impl MockRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    /// Set a header, replacing any header with the same name in another case.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and content type.
    pub fn with_json(self, value: &Value) -> Self {
        self.with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_body(value.to_string())
    }

    /// Set a url-encoded form body and content type.
    pub fn with_form(self, fields: &Value) -> Self {
        self.with_header("Content-Type", FORM_CONTENT_TYPE)
            .with_body(encode_form(fields))
    }

    /// The URL with any query string removed.
    pub fn url_without_query(&self) -> &str {
        strip_query(&self.url)
    }

    /// The raw query string, if the URL has one.
    pub fn query_string(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Query parameters as a map of decoded values.
    pub fn query_params(&self) -> Value {
        Value::Object(parse_query_string(self.query_string().unwrap_or("")))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Whether the Content-Type header declares JSON.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.starts_with(JSON_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Decode the body as JSON.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Decode the body as url-encoded form fields.
    pub fn body_fields(&self) -> Value {
        Value::Object(parse_query_string(&self.body))
    }
}

/// Remove the query string from a URL.
pub(crate) fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

/// Parse a query string (or url-encoded form body) into decoded values.
///
/// Repeated keys and `key[]` keys collect into lists. Bracketed names nest:
/// `a[b]=c` decodes to `{"a": {"b": "c"}}` and `ids[0]=1&ids[1]=2` to
/// `{"ids": ["1", "2"]}`, mirroring [`encode_form`].
pub fn parse_query_string(query: &str) -> Map<String, Value> {
    let mut params = Map::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = part.split_once('=').unwrap_or((part, ""));
        let key = decode_component(raw_key);
        let value = Value::String(decode_component(raw_value));

        let (name, path) = split_key(&key);
        let slot = params.entry(name).or_insert(Value::Null);
        insert_at(slot, &path, value);
    }

    for value in params.values_mut() {
        fold_indexed(value);
    }
    params
}

/// Split `a[b][]` into `("a", ["b", ""])`. Malformed names stay flat.
fn split_key(key: &str) -> (String, Vec<String>) {
    let flat = || (key.to_string(), Vec::new());

    let Some(open) = key.find('[') else {
        return flat();
    };
    if open == 0 {
        return flat();
    }

    let mut path = Vec::new();
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return flat();
        };
        let Some(close) = inner.find(']') else {
            return flat();
        };
        path.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    (key[..open].to_string(), path)
}

fn insert_at(slot: &mut Value, path: &[String], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        match slot {
            Value::Null => *slot = value,
            Value::Array(items) => items.push(value),
            existing => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
        return;
    };

    if segment.is_empty() {
        if !slot.is_array() {
            let existing = slot.take();
            *slot = Value::Array(if existing.is_null() { vec![] } else { vec![existing] });
        }
        if let Value::Array(items) = slot {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                insert_at(last, rest, value);
            }
        }
        return;
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(segment.clone()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

/// Turn maps keyed `0..n` into lists, depth first.
fn fold_indexed(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(fold_indexed),
        Value::Object(map) => {
            map.values_mut().for_each(fold_indexed);

            let mut indexed: Vec<(usize, Value)> = Vec::with_capacity(map.len());
            for (key, nested) in map.iter() {
                match key.parse::<usize>() {
                    Ok(i) if i.to_string() == *key => indexed.push((i, nested.clone())),
                    _ => return,
                }
            }
            if indexed.is_empty() {
                return;
            }
            indexed.sort_by_key(|(i, _)| *i);
            if indexed.iter().enumerate().all(|(pos, (i, _))| pos == *i) {
                *value = Value::Array(indexed.into_iter().map(|(_, v)| v).collect());
            }
        }
        _ => {}
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// Encode a map as a url-encoded form body.
///
/// Nested maps and lists use `key[sub]` names; nulls are skipped and
/// booleans encode as `1`/`0`.
pub fn encode_form(data: &Value) -> String {
    let mut pairs = Vec::new();
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                push_pairs(key, value, &mut pairs);
            }
        }
        Value::Null => {}
        other => pairs.push(urlencoding::encode(&scalar(other)).into_owned()),
    }
    pairs.join("&")
}

fn push_pairs(name: &str, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, nested) in map {
                push_pairs(&format!("{}[{}]", name, key), nested, pairs);
            }
        }
        Value::Array(items) => {
            for (i, nested) in items.iter().enumerate() {
                push_pairs(&format!("{}[{}]", name, i), nested, pairs);
            }
        }
        other => pairs.push(format!(
            "{}={}",
            urlencoding::encode(name),
            urlencoding::encode(&scalar(other))
        )),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}
