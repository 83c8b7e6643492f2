//! Response buffer
//!
//! Status, headers, cookies and body accumulate here while the chain runs.
//! Nothing reaches the network until [`Response::flush_into`] is called
//! once after the chain finishes, so any handler may still change status
//! or headers after an earlier handler wrote body bytes.

use crate::cookie::Cookie;
use crate::pool::Reusable;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use smallvec::SmallVec;

/// Status used when a handler never sets one
pub const DEFAULT_STATUS: u16 = 200;

/// MIME types used by the built-in encoders
pub mod mime {
    pub const JSON: &str = "application/json";
    pub const HTML: &str = "text/html";
    pub const TEXT: &str = "text/plain";
}

/// Destination of a flushed response
pub trait ResponseWriter {
    /// Append one header value
    fn write_header(&mut self, name: &str, value: &str);
    /// Set the status line
    fn write_status(&mut self, status: u16);
    /// Send the body
    fn write_body(&mut self, body: Bytes);
}

/// Response buffer
#[derive(Debug)]
pub struct Response {
    status: u16,
    /// Header multimap; values for one name keep insertion order
    headers: SmallVec<[(String, String); 8]>,
    cookies: Vec<Cookie>,
    body: BytesMut,
}

impl Response {
    /// Create an empty 200 response
    pub fn new() -> Self {
        Self {
            status: DEFAULT_STATUS,
            headers: SmallVec::new(),
            cookies: Vec::new(),
            body: BytesMut::new(),
        }
    }

    /// Current status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the status code
    ///
    /// Values outside `1..=999` are rejected and the previous status is kept.
    pub fn set_status(&mut self, code: i32) -> Result<()> {
        if !(1..=999).contains(&code) {
            return Err(Error::InvalidStatusCode(code));
        }
        self.status = code as u16;
        Ok(())
    }

    /// First value of a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in insertion order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All buffered headers
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Append a value to a header
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replace every value of a header with `value`
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove_header(&name);
        self.headers.push((name, value.into()));
    }

    /// Drop every value of a header
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Set the `Content-Type` header
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header(CONTENT_TYPE.as_str(), content_type);
    }

    /// Queue cookies; each becomes a `Set-Cookie` header at flush time
    pub fn add_cookies(&mut self, cookies: impl IntoIterator<Item = Cookie>) {
        self.cookies.extend(cookies);
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Append bytes to the body, returning the number written
    pub fn write_body(&mut self, data: &[u8]) -> usize {
        self.body.extend_from_slice(data);
        data.len()
    }

    /// Body bytes buffered so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Write the buffered response to `writer`
    ///
    /// Order: cookies become `Set-Cookie` headers, then every header is
    /// written, then the status, then the body.
    pub fn flush_into<W: ResponseWriter>(&mut self, writer: &mut W) {
        for cookie in self.cookies.drain(..) {
            self.headers
                .push((SET_COOKIE.as_str().to_string(), cookie.to_header_value()));
        }

        for (name, value) in &self.headers {
            writer.write_header(name, value);
        }

        if !(1..=999).contains(&self.status) {
            self.status = DEFAULT_STATUS;
        }
        writer.write_status(self.status);

        writer.write_body(self.body.split().freeze());
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Reusable for Response {
    fn reset(&mut self) {
        self.status = DEFAULT_STATUS;
        self.headers.clear();
        self.cookies.clear();
        self.body.clear();
    }
}

impl ResponseWriter for http::Response<Full<Bytes>> {
    fn write_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = name, "dropping header with invalid name or value"),
        }
    }

    fn write_status(&mut self, status: u16) {
        // hyper only speaks 100..=999
        *self.status_mut() = StatusCode::from_u16(status).unwrap_or_else(|_| {
            tracing::warn!(status, "status not representable on the wire, sending 200");
            StatusCode::OK
        });
    }

    fn write_body(&mut self, body: Bytes) {
        *self.body_mut() = Full::new(body);
    }
}

/// In-memory [`ResponseWriter`] for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in write order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Get body as string (if UTF-8)
    pub fn body_string(&self) -> Option<String> {
        std::str::from_utf8(&self.body).ok().map(|s| s.to_string())
    }
}

impl ResponseWriter for Recorder {
    fn write_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_status(&mut self, status: u16) {
        self.status = status;
    }

    fn write_body(&mut self, body: Bytes) {
        self.body = body;
    }
}
