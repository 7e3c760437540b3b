//! Response write state.
//!
//! Handlers never build a response value and return it. They write fields on
//! the [`Context`](crate::Context) (status, headers, body) and the engine
//! turns whatever was written into its own native response once the chain
//! has returned. A field may be overwritten any number of times until the
//! response is committed; after that every write is ignored.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for [`Context::bytes`](crate::Context::bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Css,          // text/css
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Javascript,   // text/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Png,          // image/png
    Svg,          // image/svg+xml
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "text/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    /// Best guess from a file extension; unknown extensions are binary.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css"          => Self::Css,
            "csv"          => Self::Csv,
            "htm" | "html" => Self::Html,
            "js" | "mjs"   => Self::Javascript,
            "json"         => Self::Json,
            "pdf"          => Self::Pdf,
            "png"          => Self::Png,
            "svg"          => Self::Svg,
            "txt"          => Self::Text,
            "xml"          => Self::Xml,
            _              => Self::OctetStream,
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// What the chain has written so far for one request.
///
/// Defaults to `200 OK` with no headers and an empty body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    committed: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            committed: false,
        }
    }
}

impl Response {
    /// A committed plain-text answer engines use when no route ran at all.
    pub fn from_status(status: StatusCode, message: &str) -> Self {
        let mut res = Self::default();
        res.fail(status, message);
        res.commit();
        res
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn is_committed(&self) -> bool { self.committed }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        if self.writable("status") {
            self.status = status;
        }
    }

    pub(crate) fn set_header(&mut self, name: &str, value: &str) {
        if !self.writable("header") {
            return;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(name, "invalid response header dropped"),
        }
    }

    pub(crate) fn set_body(&mut self, content_type: &'static str, body: Bytes) {
        if self.writable("body") {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            self.body = body;
        }
    }

    pub(crate) fn clear_body(&mut self) {
        if self.writable("body") {
            self.headers.remove(CONTENT_TYPE);
            self.body = Bytes::new();
        }
    }

    /// Finalizes the response. Idempotent.
    pub(crate) fn commit(&mut self) {
        self.committed = true;
    }

    /// Replaces whatever was written with an error answer, unless committed.
    pub(crate) fn fail(&mut self, status: StatusCode, message: &str) {
        if self.committed {
            return;
        }
        self.status = status;
        self.headers.clear();
        self.set_body(
            "text/plain; charset=utf-8",
            Bytes::copy_from_slice(message.as_bytes()),
        );
    }

    fn writable(&self, field: &'static str) -> bool {
        if self.committed {
            warn!(field, "response already committed; write ignored");
        }
        !self.committed
    }

    /// Converts into the `http` crate's response type with a full body.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
