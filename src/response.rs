//! Outgoing HTTP response.
//!
//! A [`Response`] is written, not returned: middleware sets the status line
//! and headers with [`Response::write_head`] / [`Response::set_header`] and
//! completes it with [`Response::end`]. `end` succeeds exactly once per
//! request; the application's 404/500 fallbacks check
//! [`Response::is_finished`] first, so a finished response is never
//! overwritten.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::{error, warn};

use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values.
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,        // text/html
    Json,        // application/json
    OctetStream, // application/octet-stream
    Text,        // text/plain
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

type FinishHook = Box<dyn FnOnce(&Response) + Send + 'static>;

/// An outgoing HTTP response.
///
/// ```rust
/// use veslo::{ContentType, Response, StatusCode};
///
/// let mut res = Response::new();
/// res.write_head(StatusCode::CREATED, &[("content-type", ContentType::Json.as_str())])
///     .end(r#"{"id":42}"#)
///     .unwrap();
///
/// assert!(res.is_finished());
/// assert!(res.end("again").is_err());
/// ```
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    finished: bool,
    on_finish: Vec<FinishHook>,
}

impl Response {
    /// A blank `200 OK` response with no headers.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Bytes::new(),
            finished: false,
            on_finish: Vec::new(),
        }
    }

    /// Sets the status and merges `headers` into the header list.
    ///
    /// Ignored (with a warning) once the response is finished.
    pub fn write_head(&mut self, status: StatusCode, headers: &[(&str, &str)]) -> &mut Self {
        if self.finished {
            warn!(status = status.as_u16(), "write_head after end; ignored");
            return self;
        }
        self.status = status;
        for (name, value) in headers {
            self.put_header(name, value);
        }
        self
    }

    /// Sets one header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.finished {
            warn!(header = name, "set_header after end; ignored");
            return self;
        }
        self.put_header(name, value);
        self
    }

    /// Completes the response with `body`.
    ///
    /// Runs every [`on_finish`](Response::on_finish) hook. Fails with
    /// [`Error::ResponseAlreadySent`] if the response was already completed.
    pub fn end(&mut self, body: impl Into<Bytes>) -> Result<(), Error> {
        if self.finished {
            return Err(Error::ResponseAlreadySent);
        }
        self.body = body.into();
        self.finished = true;
        for hook in std::mem::take(&mut self.on_finish) {
            hook(self);
        }
        Ok(())
    }

    /// Registers a callback that runs once, when [`end`](Response::end) succeeds.
    pub fn on_finish(&mut self, hook: impl FnOnce(&Response) + Send + 'static) {
        if self.finished {
            hook(self);
        } else {
            self.on_finish.push(Box::new(hook));
        }
    }

    pub fn is_finished(&self) -> bool { self.finished }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn put_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Converts into the hyper response sent on the wire.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Full::new(self.body)).unwrap_or_else(|e| {
            error!("invalid response head: {e}");
            let mut res = http::Response::new(Full::new(Bytes::new()));
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            res
        })
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}
