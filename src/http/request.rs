use crate::exception::HttpException;
use axum::body::Bytes;
use axum::extract::FromRequest;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

/// Request section a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Section {
    Body,
    Query,
    Path,
}

/// Host-neutral view of an incoming request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Map<String, Value>,
    params: Map<String, Value>,
    body: Value,
    attributes: Map<String, Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Map::new(),
            params: Map::new(),
            body: Value::Null,
            attributes: Map::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Repeated keys collect into an array.
    pub fn with_query_string(mut self, query: &str) -> Self {
        self.query = parse_form(query.as_bytes());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "ignoring invalid request header"),
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.query
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn set_params(&mut self, params: Map<String, Value>) {
        self.params = params;
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// Values attached by middleware for later stages, e.g. the current user.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Look up `key` in a request section; `None` selects the whole section.
    pub fn lookup(&self, section: Section, key: Option<&str>) -> Option<Value> {
        let root = match section {
            Section::Body => match &self.body {
                Value::Null => return None,
                body => body,
            },
            Section::Query => return lookup_map(&self.query, key),
            Section::Path => return lookup_map(&self.params, key),
        };
        match key {
            None => Some(root.clone()),
            Some(key) => lookup_path(root, key).cloned(),
        }
    }

    /// Whether the client expects a JSON error body.
    pub fn wants_json(&self) -> bool {
        let accepts_json = self
            .header(ACCEPT.as_str())
            .is_some_and(|accept| accept.contains("application/json") || accept.contains("+json"));
        let sent_json = self
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|content| content.starts_with("application/json"));
        let xhr = self
            .header("x-requested-with")
            .is_some_and(|value| value.eq_ignore_ascii_case("xmlhttprequest"));
        accepts_json || sent_json || xhr
    }

    /// Convert an axum request, buffering the body.
    ///
    /// Form bodies become an object, anything else non-empty must be JSON.
    /// The body size is capped by the `DefaultBodyLimit` in effect for the
    /// request; a larger body is a 413.
    pub async fn from_axum(request: axum::extract::Request) -> Result<Self, HttpException> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        let headers = request.headers().clone();
        let bytes = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| HttpException::with_status(rejection.status(), rejection.body_text()))?;

        let is_form = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content| content.starts_with("application/x-www-form-urlencoded"));

        let body = if bytes.is_empty() {
            Value::Null
        } else if is_form {
            Value::Object(parse_form(&bytes))
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| HttpException::bad_request(format!("Invalid JSON body: {e}")))?
        };

        Ok(Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(|q| parse_form(q.as_bytes())).unwrap_or_default(),
            headers,
            params: Map::new(),
            body,
            attributes: Map::new(),
        })
    }
}

fn lookup_map(map: &Map<String, Value>, key: Option<&str>) -> Option<Value> {
    match key {
        None if map.is_empty() => None,
        None => Some(Value::Object(map.clone())),
        Some(key) => match map.get(key) {
            Some(value) => Some(value.clone()),
            None => {
                let (head, rest) = key.split_once('.')?;
                lookup_path(map.get(head)?, rest).cloned()
            }
        },
    }
}

/// Dotted lookup (`a.b.0.c`) into nested objects and arrays.
///
/// A key containing dots that exists verbatim wins over nested access.
pub fn lookup_path<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    if let Some(found) = value.as_object().and_then(|object| object.get(key)) {
        return Some(found);
    }
    key.split('.').try_fold(value, |current, segment| match current {
        Value::Object(object) => object.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn parse_form(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let key = key.trim_end_matches("[]").to_string();
        let value = Value::String(value.into_owned());
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    map
}
