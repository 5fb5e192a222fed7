//! Incoming HTTP request type.
//!
//! [`Request`] wraps what the transport hands over (method, url, headers, raw
//! body bytes) together with the per-request dispatch state: whether a route
//! has claimed it, the path captures of that route, and the parsed body slot
//! filled by a body-parsing middleware such as
//! [`BodyParser`](crate::middleware::BodyParser).

use bytes::Bytes;

use crate::method::Method;
use crate::path::Params;

/// A parsed request body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    raw: Bytes,
    pub(crate) resolved: bool,
    pub(crate) params: Params,
    body: Option<Body>,
}

impl Request {
    /// A request with no headers and an empty body. `url` is the request target
    /// as received, e.g. `/users/42?expand=1`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            raw: Bytes::new(),
            resolved: false,
            params: Params::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_raw_body(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw = raw.into();
        self
    }

    pub(crate) fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> Method { self.method }

    /// The request target as received (path plus query), not an absolute
    /// URL. Combine it with [`host`](Request::host) for the full address.
    pub fn url(&self) -> &str { &self.url }

    /// The `host` header, e.g. `example.com:8080`.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// The path component of the url, without the query string.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body bytes exactly as they came off the wire.
    pub fn raw_body(&self) -> &[u8] { &self.raw }

    /// The parsed body, if a body parser ran and there was something to parse.
    pub fn body(&self) -> Option<&Body> { self.body.as_ref() }

    pub fn set_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    /// `true` once a route has claimed this request.
    pub fn is_resolved(&self) -> bool { self.resolved }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &Params { &self.params }
}
