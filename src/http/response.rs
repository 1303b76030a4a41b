use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Html(String),
    Text(String),
}

/// A finalized response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::new(status).with_body(ResponseBody::Json(body))
    }

    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status).with_body(ResponseBody::Html(body.into()))
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status).with_body(ResponseBody::Text(body.into()))
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Set a header; invalid names or values are ignored.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "ignoring invalid response header"),
        }
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.body = body;
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ResponseBody::Empty => self.status.into_response(),
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
            ResponseBody::Html(html) => (self.status, Html(html)).into_response(),
            ResponseBody::Text(text) => (self.status, text).into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Shared draft of the response for the request in flight.
///
/// Handlers and middleware may set status and headers through it; the
/// pipeline fills in the body.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<HttpResponse>>);

impl ResponseHandle {
    pub fn new(response: HttpResponse) -> Self {
        Self(Arc::new(Mutex::new(response)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut HttpResponse) -> R) -> R {
        let mut response = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut response)
    }

    pub fn status(&self) -> StatusCode {
        self.with(|response| response.status())
    }

    pub fn set_status(&self, status: StatusCode) {
        self.with(|response| response.set_status(status));
    }

    pub fn insert_header(&self, name: &str, value: &str) {
        self.with(|response| response.insert_header(name, value));
    }

    pub fn replace(&self, response: HttpResponse) {
        self.with(|current| *current = response);
    }

    pub fn snapshot(&self) -> HttpResponse {
        self.with(|response| response.clone())
    }
}
